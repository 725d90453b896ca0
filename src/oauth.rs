//! Reference [`AuthenticationProvider`](crate::auth::AuthenticationProvider) backed by the
//! `oauth2` crate.
//!
//! [`OAuth2Authenticator`] keeps an in-memory [`Session`](crate::auth::Session) and refreshes it
//! with the `refresh_token` grant against an [`AuthServerDescriptor`]. Refresh secrets rotate
//! whenever the server returns a new one, and OAuth error responses surface as
//! [`ProviderError::Rejected`](crate::auth::ProviderError::Rejected) with an
//! `{"error", "error_description"}` payload the guard turns into its failure message.

pub mod descriptor;

pub use descriptor::*;
pub use oauth2;

#[cfg(feature = "reqwest")] pub use authenticator::OAuth2Authenticator;

#[cfg(feature = "reqwest")]
mod authenticator {
	// crates.io
	use oauth2::{
		AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
		RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
		basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	};
	use serde_json::{Map, Value};
	// self
	use super::{AuthServerDescriptor, ClientAuthMethod};
	use crate::{
		_prelude::*,
		auth::{
			AccessToken, AuthenticationProvider, ProviderError, ProviderFuture, RefreshSecret,
			Session,
		},
		error::{ConfigError, TransportError},
		http::{ReqwestTransport, ResponseMetadata, ResponseMetadataSlot},
	};

	type ConfiguredBasicClient =
		BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
	type RefreshRequestError = BasicRequestTokenError<HttpClientError<ReqwestError>>;

	/// Session holder that refreshes through an OAuth 2.0 token endpoint.
	///
	/// Refresh calls are serialized, so guards sharing one authenticator never present the same
	/// refresh secret twice.
	pub struct OAuth2Authenticator {
		descriptor: AuthServerDescriptor,
		oauth_client: ConfiguredBasicClient,
		transport: ReqwestTransport,
		session: RwLock<Session>,
		refresh_lock: AsyncMutex<()>,
	}
	impl OAuth2Authenticator {
		/// Builds an authenticator for `client_id` against `descriptor`.
		pub fn new(
			descriptor: AuthServerDescriptor,
			client_id: impl Into<String>,
			transport: ReqwestTransport,
		) -> Result<Self, ConfigError> {
			descriptor.validate()?;

			let token_url = TokenUrl::new(descriptor.token_endpoint.to_string())
				.map_err(|source| ConfigError::InvalidEndpoint { source })?;
			let mut oauth_client =
				BasicClient::new(ClientId::new(client_id.into())).set_token_uri(token_url);

			if matches!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
				oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
			}

			Ok(Self {
				descriptor,
				oauth_client,
				transport,
				session: Default::default(),
				refresh_lock: AsyncMutex::new(()),
			})
		}

		/// Authenticates the client with `secret`; ignored for [`ClientAuthMethod::None`].
		pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
			if !matches!(self.descriptor.client_auth_method, ClientAuthMethod::None) {
				self.oauth_client = self.oauth_client.set_client_secret(ClientSecret::new(secret.into()));
			}

			self
		}

		/// Seeds the authenticator with an existing session.
		pub fn with_session(self, session: Session) -> Self {
			*self.session.write() = session;

			self
		}

		/// Descriptor the authenticator refreshes against.
		pub fn descriptor(&self) -> &AuthServerDescriptor {
			&self.descriptor
		}

		/// Snapshot of the current session.
		pub fn session(&self) -> Session {
			self.session.read().clone()
		}

		/// Installs tokens obtained outside the authenticator, replacing the current session.
		pub fn sign_in(&self, session: Session) {
			*self.session.write() = session;
		}

		fn refresh_secret(&self) -> Option<RefreshSecret> {
			self.session.read().refresh_token.clone().filter(|secret| !secret.is_empty())
		}

		async fn refresh(&self) -> Result<Option<AccessToken>, ProviderError> {
			let _serialized = self.refresh_lock.lock().await;
			let secret = self.refresh_secret().ok_or(ProviderError::MissingRefreshToken)?;
			let meta = ResponseMetadataSlot::default();
			let http_client = self.transport.instrumented(meta.clone());
			let refresh_token = RefreshToken::new(secret.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_token);

			for scope in &self.descriptor.scopes {
				request = request.add_scope(Scope::new(scope.clone()));
			}

			let response = request
				.request_async(&http_client)
				.await
				.map_err(|e| map_request_error(meta.take(), e))?;
			let session = rotate_session(&response, secret, OffsetDateTime::now_utc())?;
			let token = session.access_token.clone();

			*self.session.write() = session;

			Ok(token)
		}
	}
	impl AuthenticationProvider for OAuth2Authenticator {
		fn token(&self) -> Option<AccessToken> {
			self.session.read().access_token.clone().filter(|token| !token.is_empty())
		}

		fn refresh_token(&self) -> ProviderFuture<'_, Option<AccessToken>> {
			Box::pin(self.refresh())
		}

		fn logout(&self) -> ProviderFuture<'_, ()> {
			self.session.write().clear();

			Box::pin(async { Ok(()) })
		}
	}
	impl Debug for OAuth2Authenticator {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("OAuth2Authenticator")
				.field("descriptor", &self.descriptor)
				.field("session", &*self.session.read())
				.finish()
		}
	}

	fn rotate_session(
		response: &BasicTokenResponse,
		previous: RefreshSecret,
		now: OffsetDateTime,
	) -> Result<Session, ConfigError> {
		let expires_at = match response.expires_in() {
			Some(expires_in) => {
				let seconds = i64::try_from(expires_in.as_secs())
					.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

				Some(
					now.checked_add(Duration::seconds(seconds))
						.ok_or(ConfigError::ExpiresInOutOfRange)?,
				)
			},
			None => None,
		};
		let refresh_token = response
			.refresh_token()
			.map(|token| RefreshSecret::new(token.secret().to_owned()))
			.unwrap_or(previous);

		Ok(Session {
			access_token: Some(AccessToken::new(response.access_token().secret().to_owned())),
			refresh_token: Some(refresh_token),
			expires_at,
		})
	}

	fn map_request_error(meta: Option<ResponseMetadata>, err: RefreshRequestError) -> ProviderError {
		let status = meta.and_then(|value| value.status);

		match err {
			RequestTokenError::ServerResponse(response) =>
				ProviderError::Rejected { status, payload: Some(error_payload(&response)) },
			RequestTokenError::Request(error) => map_transport_error(error),
			RequestTokenError::Parse(source, _body) =>
				ProviderError::MalformedResponse { source, status },
			RequestTokenError::Other(message) => ProviderError::Other {
				message: format!("Token endpoint returned an unexpected response: {message}."),
			},
		}
	}

	fn error_payload(response: &BasicErrorResponse) -> Value {
		let mut payload = Map::new();

		payload.insert("error".into(), Value::String(response.error().as_ref().to_owned()));

		if let Some(description) = response.error_description() {
			payload.insert("error_description".into(), Value::String(description.clone()));
		}

		Value::Object(payload)
	}

	fn map_transport_error(err: HttpClientError<ReqwestError>) -> ProviderError {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => ProviderError::Other {
				message: format!(
					"HTTP client error occurred while calling the token endpoint: {message}."
				),
			},
			_ => ProviderError::Other {
				message: "HTTP client error occurred while calling the token endpoint.".into(),
			},
		}
	}

}
