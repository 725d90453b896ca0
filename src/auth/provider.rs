//! Authentication provider contract consumed by the guard.
//!
//! The guard only reads the current access token, asks for a refresh when the downstream
//! rejects it, and delegates logout. Navigation, storage cleanup, and any other session side
//! effects belong to the provider.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`AuthenticationProvider`] operations.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderError>> + 'a + Send>>;

/// Source of access tokens for [`RefreshGuard`](crate::guard::RefreshGuard).
pub trait AuthenticationProvider
where
	Self: Send + Sync,
{
	/// Returns the current access token, if one is available.
	fn token(&self) -> Option<AccessToken>;

	/// Obtains a new access token.
	///
	/// Resolves to `Ok(None)` or an error when the refresh credential is no longer valid.
	fn refresh_token(&self) -> ProviderFuture<'_, Option<AccessToken>>;

	/// Ends the current session.
	fn logout(&self) -> ProviderFuture<'_, ()>;
}
impl<P> AuthenticationProvider for Arc<P>
where
	P: ?Sized + AuthenticationProvider,
{
	fn token(&self) -> Option<AccessToken> {
		(**self).token()
	}

	fn refresh_token(&self) -> ProviderFuture<'_, Option<AccessToken>> {
		(**self).refresh_token()
	}

	fn logout(&self) -> ProviderFuture<'_, ()> {
		(**self).logout()
	}
}

/// Failures reported by an [`AuthenticationProvider`].
#[derive(Debug, ThisError)]
pub enum ProviderError {
	/// The authorization server rejected the request.
	#[error("Authorization server rejected the request{}.", status_suffix(.status))]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Upstream error payload, when available.
		payload: Option<serde_json::Value>,
	},
	/// The authorization server answered with a payload that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The session holds no refresh credential.
	#[error("Session is missing a refresh token.")]
	MissingRefreshToken,
	/// Provider-specific failure without a structured payload.
	#[error("{message}")]
	Other {
		/// Human-readable failure message.
		message: String,
	},
	/// Transport failure while talking to the authorization server.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl ProviderError {
	/// Upstream error payload carried by [`ProviderError::Rejected`].
	pub fn payload(&self) -> Option<&serde_json::Value> {
		match self {
			Self::Rejected { payload, .. } => payload.as_ref(),
			_ => None,
		}
	}

	/// Reads the `error` field of the upstream payload.
	///
	/// String values are returned verbatim; other non-null values are rendered as JSON.
	pub fn upstream_message(&self) -> Option<String> {
		match self.payload()?.get("error")? {
			serde_json::Value::Null => None,
			serde_json::Value::String(message) => Some(message.clone()),
			other => Some(other.to_string()),
		}
	}

	/// HTTP status code associated with the failure, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::MalformedResponse { status, .. } => *status,
			_ => None,
		}
	}
}

fn status_suffix(status: &Option<u16>) -> String {
	status.map(|code| format!(" with HTTP {code}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn upstream_message_reads_error_field() {
		let err = ProviderError::Rejected {
			status: Some(400),
			payload: Some(serde_json::json!({ "error": "bad" })),
		};

		assert_eq!(err.upstream_message().as_deref(), Some("bad"));
		assert_eq!(err.status(), Some(400));
		assert_eq!(err.to_string(), "Authorization server rejected the request with HTTP 400.");
	}

	#[test]
	fn upstream_message_renders_structured_errors() {
		let err = ProviderError::Rejected {
			status: None,
			payload: Some(serde_json::json!({ "error": { "code": 7 } })),
		};

		assert_eq!(err.upstream_message().as_deref(), Some("{\"code\":7}"));
		assert_eq!(err.to_string(), "Authorization server rejected the request.");
	}

	#[test]
	fn upstream_message_is_absent_without_payload() {
		let null = ProviderError::Rejected {
			status: Some(500),
			payload: Some(serde_json::json!({ "error": null })),
		};

		assert!(null.upstream_message().is_none());
		assert!(ProviderError::MissingRefreshToken.upstream_message().is_none());
		assert!(ProviderError::Other { message: "boom".into() }.payload().is_none());
	}
}
