#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use bearer_refresh_guard::{
	error::TransportError,
	http::{HttpRequest, Next, ReqwestTransport, ResponseMetadataSlot},
	oauth::oauth2::{AsyncHttpClient, http::Request},
};

fn request(method: &str, uri: String, body: &[u8]) -> HttpRequest {
	Request::builder()
		.method(method)
		.uri(uri)
		.header("content-type", "application/json")
		.body(body.to_vec())
		.expect("Request should build.")
}

#[tokio::test]
async fn failure_statuses_resolve_as_responses() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/clients").body("{\"name\":\"acme\"}");
			then.status(404).header("x-trace-id", "trace-1").body("missing");
		})
		.await;
	let response = ReqwestTransport::default()
		.handle(request("POST", server.url("/clients"), b"{\"name\":\"acme\"}"))
		.await
		.expect("Failure statuses are still responses.");

	mock.assert_async().await;

	assert_eq!(response.status().as_u16(), 404);
	assert_eq!(response.body(), b"missing");
	assert_eq!(
		response.headers().get("x-trace-id").and_then(|value| value.to_str().ok()),
		Some("trace-1")
	);
}

#[tokio::test]
async fn connection_failures_surface_as_transport_errors() {
	let err = ReqwestTransport::default()
		.handle(request("GET", "http://127.0.0.1:1/unreachable".into(), b""))
		.await
		.expect_err("Nothing listens on port 1.");

	assert!(matches!(err, TransportError::Network { .. }));
}

#[tokio::test]
async fn instrumented_handle_records_the_response_status() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("busy");
		})
		.await;
	let slot = ResponseMetadataSlot::default();
	let handle = ReqwestTransport::default().instrumented(slot.clone());
	let response = handle
		.call(request("POST", server.url("/token"), b""))
		.await
		.expect("Instrumented handle should return the response.");

	assert_eq!(response.status().as_u16(), 503);
	assert_eq!(slot.take().and_then(|meta| meta.status), Some(503));
	assert!(slot.take().is_none());
}
