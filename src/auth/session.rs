//! In-memory session snapshot held by token providers.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshSecret},
};

/// Tokens currently held for a signed-in principal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	/// Access token attached to outgoing requests.
	pub access_token: Option<AccessToken>,
	/// Refresh credential used to mint new access tokens.
	pub refresh_token: Option<RefreshSecret>,
	/// Expiry instant reported by the authorization server, if any.
	pub expires_at: Option<OffsetDateTime>,
}
impl Session {
	/// Creates a session from an access token and its refresh credential.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: Some(AccessToken::new(access_token)),
			refresh_token: Some(RefreshSecret::new(refresh_token)),
			expires_at: None,
		}
	}

	/// Sets the expiry instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Returns `true` when the session holds a usable access token.
	pub fn is_signed_in(&self) -> bool {
		self.access_token.as_ref().is_some_and(|token| !token.is_empty())
	}

	/// Returns `true` once `instant` reaches the recorded expiry.
	///
	/// Sessions without an expiry never report as expired; the server decides via `401`/`419`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Drops every credential.
	pub fn clear(&mut self) {
		*self = Self::default();
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn expiry_is_inclusive() {
		let session =
			Session::new("access", "refresh").with_expires_at(macros::datetime!(2025-01-01 01:00 UTC));

		assert!(!session.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(session.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(!Session::default().is_expired_at(macros::datetime!(2030-01-01 00:00 UTC)));
	}

	#[test]
	fn clear_signs_out() {
		let mut session = Session::new("access", "refresh");

		assert!(session.is_signed_in());

		session.clear();

		assert!(!session.is_signed_in());
		assert_eq!(session, Session::default());
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let rendered = format!("{:?}", Session::new("access-raw", "refresh-raw"));

		assert!(!rendered.contains("access-raw"));
		assert!(!rendered.contains("refresh-raw"));
	}
}
