//! Validated authorization-server configuration used by the OAuth2 authenticator.

// std
use std::iter::IntoIterator;
// crates.io
use url::Host;
// self
use crate::_prelude::*;

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DescriptorError {
	/// Token endpoint is mandatory for refreshes.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Scope tokens cannot be empty or contain whitespace.
	#[error("Scope `{scope}` is not a valid scope token.")]
	InvalidScope {
		/// Offending scope value.
		scope: String,
	},
}

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public clients; only `client_id` is sent and any secret is ignored.
	None,
}

/// Authorization server the authenticator refreshes against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthServerDescriptor {
	/// Token endpoint receiving `grant_type=refresh_token` requests.
	pub token_endpoint: Url,
	/// Client authentication mechanism for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
	/// Scopes requested on refresh; empty keeps the originally granted scope.
	pub scopes: Vec<String>,
}
impl AuthServerDescriptor {
	/// Creates an empty builder.
	pub fn builder() -> AuthServerDescriptorBuilder {
		AuthServerDescriptorBuilder::default()
	}

	/// Checks endpoint security and scope syntax.
	pub fn validate(&self) -> Result<(), DescriptorError> {
		validate_endpoint("token", &self.token_endpoint)?;

		for scope in &self.scopes {
			if scope.is_empty() || scope.chars().any(char::is_whitespace) {
				return Err(DescriptorError::InvalidScope { scope: scope.clone() });
			}
		}

		Ok(())
	}
}

/// Builder for [`AuthServerDescriptor`] values.
#[derive(Debug, Default)]
pub struct AuthServerDescriptorBuilder {
	/// Token endpoint used for refreshes.
	pub token_endpoint: Option<Url>,
	/// Client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
	/// Scopes requested on refresh.
	pub scopes: Vec<String>,
}
impl AuthServerDescriptorBuilder {
	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Adds a scope requested on refresh.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scopes.push(scope.into());

		self
	}

	/// Adds multiple scopes requested on refresh.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<AuthServerDescriptor, DescriptorError> {
		let token_endpoint = self.token_endpoint.ok_or(DescriptorError::MissingTokenEndpoint)?;
		let descriptor = AuthServerDescriptor {
			token_endpoint,
			client_auth_method: self.client_auth_method,
			scopes: self.scopes,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(DescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
