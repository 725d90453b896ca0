//! Transport boundary for guarded requests.
//!
//! The guard never speaks HTTP itself. Downstream handlers implement [`Next`], which receives an
//! [`HttpRequest`] and resolves to an [`HttpResponse`] for every status code; only failures that
//! happen before a response exists are reported as [`TransportError`]. Responses at or above
//! `400` are wrapped in [`StatusError`] by the guard so callers can inspect the untouched status,
//! headers, and body.
//!
//! With the `reqwest` feature, [`ReqwestTransport`] adapts a [`ReqwestClient`] to [`Next`] and
//! also serves as the `oauth2` HTTP client for
//! [`OAuth2Authenticator`](crate::oauth::OAuth2Authenticator).
//! The OAuth adapter records response metadata in a [`ResponseMetadataSlot`] so refresh failures
//! can report the HTTP status the token endpoint answered with.

pub use oauth2::{HttpRequest, HttpResponse};

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use oauth2::{AsyncHttpClient, HttpClientError};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`Next::handle`].
pub type NextFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Downstream request handler invoked by the guard.
///
/// Implementations must resolve to `Ok` for every HTTP response regardless of its status; the
/// guard classifies failure statuses itself.
pub trait Next
where
	Self: Send + Sync,
{
	/// Sends `request` downstream.
	fn handle(&self, request: HttpRequest) -> NextFuture<'_>;
}
impl<N> Next for Arc<N>
where
	N: ?Sized + Next,
{
	fn handle(&self, request: HttpRequest) -> NextFuture<'_> {
		(**self).handle(request)
	}
}

/// Downstream response whose status signals a failure (`>= 400`).
pub struct StatusError {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl StatusError {
	/// Wraps a failed response, keeping its status, headers, and body intact.
	pub fn from_response(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self { status: parts.status, headers: parts.headers, body }
	}

	/// HTTP status returned downstream.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers returned downstream.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw response body.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Parses the body as JSON, returning `None` for empty or malformed payloads.
	pub fn json(&self) -> Option<serde_json::Value> {
		serde_json::from_slice(&self.body).ok()
	}

	/// Reads the OAuth-style `error` code from a JSON body.
	pub fn oauth_error(&self) -> Option<String> {
		self.json()?.get("error")?.as_str().map(ToOwned::to_owned)
	}

	/// Rebuilds the original response.
	pub fn into_response(self) -> HttpResponse {
		let mut response = HttpResponse::new(self.body);

		*response.status_mut() = self.status;
		*response.headers_mut() = self.headers;

		response
	}
}
impl Debug for StatusError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StatusError")
			.field("status", &self.status)
			.field("headers", &self.headers)
			.field("body_len", &self.body.len())
			.finish()
	}
}
impl Display for StatusError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Downstream request failed with HTTP {}.", self.status.as_u16())
	}
}
impl StdError for StatusError {}

/// Returns `true` when `status` must be treated as a failed request.
pub fn is_failure(status: StatusCode) -> bool {
	status.is_client_error() || status.is_server_error()
}

/// Copies `request` and sets `Authorization: <scheme> <token>` on the copy.
///
/// The input request is left untouched, so callers can keep it for replays.
pub fn attach_token(
	request: &HttpRequest,
	token: &AccessToken,
	scheme: &str,
) -> Result<HttpRequest, ConfigError> {
	let mut value = HeaderValue::try_from(format!("{scheme} {}", token.expose()))
		.map_err(|source| ConfigError::InvalidHeaderValue { header: "authorization", source })?;

	value.set_sensitive(true);

	let mut attached = clone_request(request);

	attached.headers_mut().insert(AUTHORIZATION, value);

	Ok(attached)
}

/// Copies method, URI, version, headers, and body of `request`.
///
/// Request extensions are not cloneable and are dropped.
pub fn clone_request(request: &HttpRequest) -> HttpRequest {
	let mut cloned = HttpRequest::new(request.body().clone());

	*cloned.method_mut() = request.method().clone();
	*cloned.uri_mut() = request.uri().clone();
	*cloned.version_mut() = request.version();
	*cloned.headers_mut() = request.headers().clone();

	cloned
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
///
/// A fresh slot is created for each token request; transports call
/// [`take`](ResponseMetadataSlot::take) before dispatching and
/// [`store`](ResponseMetadataSlot::store) once a status is known.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints return results directly, so any custom [`ReqwestClient`] used for refresh
/// calls should disable redirect following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an `oauth2` HTTP client handle that records response metadata in `slot`.
	pub fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Next for ReqwestTransport {
	fn handle(&self, request: HttpRequest) -> NextFuture<'_> {
		Box::pin(async move {
			let response = self.0.execute(request.try_into()?).await?;

			collect_response(response).await.map_err(TransportError::from)
		})
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// `oauth2` HTTP client returned by [`ReqwestTransport::instrumented`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;

			client.slot.store(ResponseMetadata { status: Some(response.status().as_u16()) });

			collect_response(response).await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))
		})
	}
}

#[cfg(feature = "reqwest")]
async fn collect_response(response: reqwest::Response) -> Result<HttpResponse, ReqwestError> {
	let status = response.status();
	let version = response.version();
	let headers = response.headers().to_owned();
	let mut collected = HttpResponse::new(response.bytes().await?.to_vec());

	*collected.status_mut() = status;
	*collected.version_mut() = version;
	*collected.headers_mut() = headers;

	Ok(collected)
}
