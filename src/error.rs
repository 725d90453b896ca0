//! Guard-level error types and the authorization failure taxonomy.

// self
use crate::{_prelude::*, auth::ProviderError, http::StatusError, oauth::DescriptorError};

/// Guard-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by [`RefreshGuard::intercept`](crate::guard::RefreshGuard::intercept).
#[derive(Debug, ThisError)]
pub enum Error {
	/// The server reported the refresh credential as permanently invalid; the session was logged
	/// out before this error surfaced.
	#[error("Refresh credential was rejected with invalid_grant (HTTP {}).", .0.status().as_u16())]
	InvalidGrant(#[source] StatusError),
	/// The shared refresh cycle failed; the session was logged out.
	///
	/// `message` is the upstream payload's `error` field when present, otherwise the policy's
	/// fallback message.
	#[error("{message}")]
	RefreshFailed {
		/// Human-readable failure message.
		message: String,
		/// Provider failure observed by the request that ran the refresh, if any.
		#[source]
		source: Option<Box<ProviderError>>,
	},
	/// Downstream answered with a failure status the guard does not interpret.
	#[error(transparent)]
	Status(#[from] StatusError),
	/// Transport failure (DNS, TCP, TLS) surfaced unchanged.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Maps the error back onto the [`AuthFailure`] taxonomy.
	pub fn failure(&self) -> AuthFailure {
		match self {
			Self::InvalidGrant(_) => AuthFailure::InvalidGrant,
			Self::RefreshFailed { .. } => AuthFailure::RefreshFailed,
			Self::Status(_) | Self::Transport(_) | Self::Config(_) => AuthFailure::Passthrough,
		}
	}

	/// Returns the downstream HTTP failure carried by this error, if any.
	pub fn status_error(&self) -> Option<&StatusError> {
		match self {
			Self::InvalidGrant(inner) | Self::Status(inner) => Some(inner),
			_ => None,
		}
	}
}

/// Authorization failure classes recognized by the guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
	/// `400` carrying `invalid_grant`: the refresh credential is permanently invalid.
	InvalidGrant,
	/// `401`: the access token was rejected.
	Unauthorized,
	/// `419`: the access token expired and must be refreshed now.
	TokenExpired,
	/// The refresh call failed or produced no token.
	RefreshFailed,
	/// Anything else; never interpreted.
	Passthrough,
}
impl AuthFailure {
	/// Terminal failures always log the session out before surfacing.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::InvalidGrant | Self::RefreshFailed)
	}

	/// Recoverable failures are handled internally through refresh and replay.
	pub const fn is_recoverable(self) -> bool {
		matches!(self, Self::Unauthorized | Self::TokenExpired)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InvalidGrant => "invalid_grant",
			Self::Unauthorized => "unauthorized",
			Self::TokenExpired => "token_expired",
			Self::RefreshFailed => "refresh_failed",
			Self::Passthrough => "passthrough",
		}
	}
}
impl Display for AuthFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value could not be encoded.
	#[error("The {header} header value is not a valid HTTP header value.")]
	InvalidHeaderValue {
		/// Header that failed to encode.
		header: &'static str,
		/// Underlying encoding failure.
		#[source]
		source: oauth2::http::header::InvalidHeaderValue,
	},
	/// Endpoint URL cannot be used by the OAuth client.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Authorization server descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] DescriptorError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
