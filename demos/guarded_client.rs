//! Demonstrates guarding a reqwest transport with an OAuth2 authenticator: the first call is
//! rejected with `401`, the guard refreshes once through the token endpoint, and the request is
//! replayed with the new bearer token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use bearer_refresh_guard::{
	auth::Session,
	guard::{RefreshGuard, ReqwestGuardedClient},
	http::ReqwestTransport,
	oauth::{AuthServerDescriptor, ClientAuthMethod, OAuth2Authenticator, oauth2::http::Request},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-2\",\"refresh_token\":\"demo-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let _expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer demo-access-1");
			then.status(401);
		})
		.await;
	let _profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer demo-access-2");
			then.status(200).header("content-type", "application/json").body("{\"name\":\"Ada\"}");
		})
		.await;
	let descriptor = AuthServerDescriptor::builder()
		.token_endpoint(Url::parse(&server.url("/oauth/token"))?)
		.client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let now = OffsetDateTime::now_utc();
	let seeded = Session::new("demo-access-1", "demo-refresh-1")
		.with_expires_at(now - Duration::minutes(1));

	println!("Seeded session expired: {}.", seeded.is_expired_at(now));

	let transport = ReqwestTransport::default();
	let authenticator = OAuth2Authenticator::new(descriptor, "demo-client", transport.clone())?
		.with_client_secret("super-secret")
		.with_session(seeded);
	let client: ReqwestGuardedClient<OAuth2Authenticator> =
		ReqwestGuardedClient::new(Arc::new(transport), RefreshGuard::new(Arc::new(authenticator)));
	let request = Request::builder().method("GET").uri(server.url("/profile")).body(Vec::new())?;
	let response = client.send(request).await?;

	println!(
		"Profile request answered {} after {} refresh: {}.",
		response.status(),
		client.guard().metrics().successes(),
		String::from_utf8_lossy(response.body()),
	);

	token_mock.assert_async().await;

	let session = client.guard().provider().session();

	println!(
		"Refreshed session expired: {}.",
		session.is_expired_at(OffsetDateTime::now_utc())
	);

	Ok(())
}
