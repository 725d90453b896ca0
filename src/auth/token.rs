//! Redacted credential wrappers keeping sensitive material out of logs.

// self
use crate::_prelude::*;

macro_rules! def_secret {
	($name:ident, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);
		impl $name {
			/// Wraps a new secret string.
			pub fn new(value: impl Into<String>) -> Self {
				Self(value.into())
			}

			/// Returns the inner value. Callers must avoid logging this string.
			pub fn expose(&self) -> &str {
				&self.0
			}

			/// Returns `true` when the wrapped value is empty or whitespace only.
			pub fn is_empty(&self) -> bool {
				self.0.trim().is_empty()
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.expose()
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&"<redacted>").finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str("<redacted>")
			}
		}
	};
}

def_secret! { AccessToken, "Opaque bearer credential attached to outgoing requests." }
def_secret! { RefreshSecret, "Longer-lived credential used to obtain new access tokens." }

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let token = AccessToken::new("super-secret");
		let refresh = RefreshSecret::new("refresh-secret");

		assert_eq!(format!("{token:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert_eq!(format!("{refresh:?}"), "RefreshSecret(\"<redacted>\")");
		assert_eq!(token.expose(), "super-secret");
	}

	#[test]
	fn blank_tokens_count_as_empty() {
		assert!(AccessToken::new("").is_empty());
		assert!(AccessToken::new("  ").is_empty());
		assert!(!AccessToken::new("newTok").is_empty());
	}

	#[test]
	fn serde_keeps_the_raw_value() {
		let token: AccessToken =
			serde_json::from_str("\"abc\"").expect("Token should deserialize from a JSON string.");

		assert_eq!(token.expose(), "abc");
		assert_eq!(
			serde_json::to_string(&token).expect("Token should serialize to a JSON string."),
			"\"abc\"",
		);
	}
}
