//! Scripted provider and handler doubles shared by the integration suites.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use parking_lot::Mutex;
// self
use bearer_refresh_guard::{
	auth::{AccessToken, AuthenticationProvider, ProviderError, ProviderFuture},
	guard::RefreshGuard,
	http::{HttpRequest, HttpResponse, Next, NextFuture},
	oauth::oauth2::http::{StatusCode, header::AUTHORIZATION},
};

/// What the next refresh call resolves to.
#[derive(Clone, Debug)]
pub enum RefreshScript {
	/// Publish the given token.
	Token(&'static str),
	/// Resolve without a token.
	Empty,
	/// Fail with the given upstream payload.
	Reject(serde_json::Value),
}

pub struct MockProvider {
	token: Mutex<Option<AccessToken>>,
	script: Mutex<RefreshScript>,
	refresh_delay: Option<Duration>,
	refreshes: AtomicUsize,
	logouts: AtomicUsize,
}
impl MockProvider {
	pub fn new(token: Option<&str>, script: RefreshScript) -> Self {
		Self {
			token: Mutex::new(token.map(AccessToken::new)),
			script: Mutex::new(script),
			refresh_delay: None,
			refreshes: AtomicUsize::new(0),
			logouts: AtomicUsize::new(0),
		}
	}

	pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
		self.refresh_delay = Some(delay);

		self
	}

	pub fn set_token(&self, token: Option<&str>) {
		*self.token.lock() = token.map(AccessToken::new);
	}

	pub fn set_script(&self, script: RefreshScript) {
		*self.script.lock() = script;
	}

	pub fn current_token(&self) -> Option<String> {
		self.token.lock().as_ref().map(|token| token.expose().to_owned())
	}

	pub fn refreshes(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}

	pub fn logouts(&self) -> usize {
		self.logouts.load(Ordering::SeqCst)
	}
}
impl AuthenticationProvider for MockProvider {
	fn token(&self) -> Option<AccessToken> {
		self.token.lock().clone()
	}

	fn refresh_token(&self) -> ProviderFuture<'_, Option<AccessToken>> {
		Box::pin(async move {
			self.refreshes.fetch_add(1, Ordering::SeqCst);

			if let Some(delay) = self.refresh_delay {
				tokio::time::sleep(delay).await;
			}

			let script = self.script.lock().clone();

			match script {
				RefreshScript::Token(raw) => {
					let token = AccessToken::new(raw);

					*self.token.lock() = Some(token.clone());

					Ok(Some(token))
				},
				RefreshScript::Empty => Ok(None),
				RefreshScript::Reject(payload) =>
					Err(ProviderError::Rejected { status: Some(400), payload: Some(payload) }),
			}
		})
	}

	fn logout(&self) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			self.logouts.fetch_add(1, Ordering::SeqCst);
			*self.token.lock() = None;

			Ok(())
		})
	}
}

type Responder = dyn Fn(Option<&str>) -> (u16, &'static str) + Send + Sync;

/// Downstream handler answering from the `Authorization` header it receives.
pub struct ScriptedNext {
	responder: Box<Responder>,
	delays: Vec<(&'static str, Duration)>,
	authorizations: Mutex<Vec<Option<String>>>,
}
impl ScriptedNext {
	pub fn new<F>(responder: F) -> Self
	where
		F: 'static + Send + Sync + Fn(Option<&str>) -> (u16, &'static str),
	{
		Self {
			responder: Box::new(responder),
			delays: Vec::new(),
			authorizations: Mutex::new(Vec::new()),
		}
	}

	/// Holds every response for requests to `path` back by `delay`.
	pub fn with_delay(mut self, path: &'static str, delay: Duration) -> Self {
		self.delays.push((path, delay));

		self
	}

	/// Answers `200` to `Bearer <token>` and `401` to anything else.
	pub fn accepting(token: &'static str) -> Self {
		let expected = format!("Bearer {token}");

		Self::new(move |authorization| {
			if authorization == Some(expected.as_str()) { (200, "ok") } else { (401, "") }
		})
	}

	/// Answers every request with `status` and `body`.
	pub fn fixed(status: u16, body: &'static str) -> Self {
		Self::new(move |_| (status, body))
	}

	pub fn authorizations(&self) -> Vec<Option<String>> {
		self.authorizations.lock().clone()
	}

	pub fn calls(&self) -> usize {
		self.authorizations.lock().len()
	}
}
impl Next for ScriptedNext {
	fn handle(&self, request: HttpRequest) -> NextFuture<'_> {
		let authorization = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(ToOwned::to_owned);
		let (status, body) = (self.responder)(authorization.as_deref());
		let delay = self
			.delays
			.iter()
			.find(|(path, _)| *path == request.uri().path())
			.map(|(_, delay)| *delay);

		self.authorizations.lock().push(authorization);

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			Ok(response(status, body))
		})
	}
}

pub fn response(status: u16, body: &str) -> HttpResponse {
	let mut response = HttpResponse::new(body.as_bytes().to_vec());

	*response.status_mut() = StatusCode::from_u16(status).expect("Status should be valid.");

	response
}

pub fn request(path: &str) -> HttpRequest {
	let mut request = HttpRequest::new(Vec::new());

	*request.uri_mut() =
		format!("https://api.example.com{path}").parse().expect("Request URI should parse.");

	request
}

pub fn guard(provider: MockProvider) -> (RefreshGuard<MockProvider>, Arc<MockProvider>) {
	let provider = Arc::new(provider);

	(RefreshGuard::new(Arc::clone(&provider)), provider)
}

pub fn bearer(token: &str) -> Option<String> {
	Some(format!("Bearer {token}"))
}
