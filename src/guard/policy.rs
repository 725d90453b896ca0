// self
use crate::{_prelude::*, error::AuthFailure, http::StatusError};

/// Status codes and wording the guard uses to classify downstream failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
	/// Status that may carry an `invalid_grant` error code.
	pub invalid_grant_status: u16,
	/// Status signalling a rejected access token.
	pub unauthorized_status: u16,
	/// Status signalling an expired access token that must be refreshed now.
	pub expired_status: u16,
	/// OAuth error code marking the refresh credential as permanently invalid.
	pub invalid_grant_code: String,
	/// Authorization scheme prefixed to the token.
	pub scheme: String,
	/// Message surfaced when a refresh fails without an upstream message.
	pub fallback_message: String,
}
impl RefreshPolicy {
	/// Overrides the authorization scheme (defaults to `Bearer`).
	pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.scheme = scheme.into();

		self
	}

	/// Overrides the status treated as "token expired, refresh now" (defaults to `419`).
	pub fn with_expired_status(mut self, status: u16) -> Self {
		self.expired_status = status;

		self
	}

	/// Overrides the fallback refresh failure message.
	pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
		self.fallback_message = message.into();

		self
	}

	/// Classifies a failed downstream response.
	pub fn classify(&self, failure: &StatusError) -> AuthFailure {
		let status = failure.status().as_u16();

		if status == self.invalid_grant_status
			&& failure.oauth_error().as_deref() == Some(self.invalid_grant_code.as_str())
		{
			AuthFailure::InvalidGrant
		} else if status == self.unauthorized_status {
			AuthFailure::Unauthorized
		} else if status == self.expired_status {
			AuthFailure::TokenExpired
		} else {
			AuthFailure::Passthrough
		}
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			invalid_grant_status: 400,
			unauthorized_status: 401,
			expired_status: 419,
			invalid_grant_code: "invalid_grant".into(),
			scheme: "Bearer".into(),
			fallback_message: "Refresh Token error".into(),
		}
	}
}
