//! Bearer-token interception with a singleflight refresh cycle.
//!
//! [`RefreshGuard::intercept`] attaches the provider's current token and forwards the request to
//! a [`Next`] handler. Failed responses are classified by [`RefreshPolicy`]:
//!
//! - `400` + `invalid_grant` logs the session out and surfaces [`Error::InvalidGrant`].
//! - `401` and `419` start a refresh cycle, or queue behind the one already running, then replay
//!   the original request with the refreshed token.
//! - Anything else surfaces unchanged as [`Error::Status`] or [`Error::Transport`].
//!
//! A failed refresh logs the session out once and releases every queued request with the same
//! [`Error::RefreshFailed`] message. Replays go straight to the handler and are never
//! re-intercepted, so a replay answered with `401` surfaces as [`Error::Status`].

mod metrics;
mod policy;
mod state;

pub use metrics::RefreshMetrics;
pub use policy::RefreshPolicy;
pub use state::RefreshState;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthenticationProvider, ProviderError},
	error::AuthFailure,
	http::{self, HttpRequest, HttpResponse, Next, StatusError},
	obs::{self, GuardEvent, GuardSpan, RefreshOutcome},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use state::{CycleOutcome, RefreshCycle, RefreshFailure, SharedState, Ticket};

#[cfg(feature = "reqwest")]
/// Guarded client specialized for the crate's reqwest transport.
pub type ReqwestGuardedClient<P> = GuardedClient<ReqwestTransport, P>;

/// Attaches bearer tokens and coordinates one shared refresh per burst of authorization
/// failures.
///
/// Clones share the refresh state, waiter queue, policy, and metrics, so one guard can be
/// cloned into every task that talks to the same API.
pub struct RefreshGuard<P>
where
	P: ?Sized + AuthenticationProvider,
{
	provider: Arc<P>,
	policy: Arc<RefreshPolicy>,
	state: SharedState,
	metrics: Arc<RefreshMetrics>,
}
impl<P> RefreshGuard<P>
where
	P: ?Sized + AuthenticationProvider,
{
	/// Creates an idle guard around `provider` with the default [`RefreshPolicy`].
	pub fn new(provider: Arc<P>) -> Self {
		Self {
			provider,
			policy: Default::default(),
			state: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the classification policy.
	pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = Arc::new(policy);

		self
	}

	/// Provider backing this guard.
	pub fn provider(&self) -> &Arc<P> {
		&self.provider
	}

	/// Policy used to classify failures.
	pub fn policy(&self) -> &RefreshPolicy {
		&self.policy
	}

	/// Counters shared by every clone of this guard.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Current refresh phase.
	pub fn state(&self) -> RefreshState {
		self.state.phase()
	}

	/// Number of requests queued behind the running refresh.
	pub fn pending_waiters(&self) -> usize {
		self.state.pending_waiters()
	}

	/// Token published by the last successful refresh; cleared when a new cycle starts.
	///
	/// Requests sent before the refresh settled whose failure arrives afterwards replay with this
	/// token instead of starting another cycle.
	pub fn published_token(&self) -> Option<AccessToken> {
		self.state.published()
	}

	/// Copies `request` with this guard's authorization scheme and `token` attached.
	pub fn attach_token(&self, request: &HttpRequest, token: &AccessToken) -> Result<HttpRequest> {
		Ok(http::attach_token(request, token, &self.policy.scheme)?)
	}

	/// Sends `request` through `next` with the current token, refreshing and replaying on
	/// authorization failures.
	pub async fn intercept<N>(&self, request: HttpRequest, next: &N) -> Result<HttpResponse>
	where
		N: ?Sized + Next,
	{
		let span = GuardSpan::new("intercept");

		span.instrument(async move {
			let sent = self.provider.token().filter(|token| !token.is_empty());
			let outgoing = match &sent {
				Some(token) => self.attach_token(&request, token)?,
				None => http::clone_request(&request),
			};
			let response = next.handle(outgoing).await?;

			if !http::is_failure(response.status()) {
				return Ok(response);
			}

			let failure = StatusError::from_response(response);

			match self.policy.classify(&failure) {
				AuthFailure::InvalidGrant => {
					self.logout().await;

					Err(Error::InvalidGrant(failure))
				},
				trigger @ (AuthFailure::Unauthorized | AuthFailure::TokenExpired) =>
					self.refresh_and_replay(trigger, sent.as_ref(), &request, next).await,
				_ => Err(failure.into()),
			}
		})
		.await
	}

	async fn refresh_and_replay<N>(
		&self,
		trigger: AuthFailure,
		sent: Option<&AccessToken>,
		request: &HttpRequest,
		next: &N,
	) -> Result<HttpResponse>
	where
		N: ?Sized + Next,
	{
		let current = self.provider.token();
		let ticket = self.state.begin_or_join(sent, current.as_ref(), &self.policy.fallback_message);
		let token = match ticket {
			Ticket::Leader(cycle) => self.run_cycle(trigger, cycle).await?,
			Ticket::Published(token) => {
				obs::record_event(GuardEvent::TokenReused);

				token
			},
			Ticket::Waiter(rx) => {
				obs::record_event(GuardEvent::WaiterEnqueued);

				match rx.await {
					Ok(Ok(token)) => token,
					Ok(Err(failure)) => return Err(failure_error(failure, None)),
					Err(_) => return Err(self.fallback_error()),
				}
			},
		};

		self.replay(request, &token, next).await
	}

	async fn run_cycle(&self, trigger: AuthFailure, cycle: RefreshCycle) -> Result<AccessToken> {
		let span = GuardSpan::new("refresh");

		obs::record_event(GuardEvent::RefreshStarted(trigger));
		obs::record_refresh_outcome(RefreshOutcome::Attempt);
		self.metrics.record_attempt();

		let (outcome, source) = span
			.instrument(async {
				match self.provider.refresh_token().await {
					Ok(Some(token)) if !token.is_empty() => (Ok(token), None),
					Ok(_) => (Err(self.fallback_failure()), None),
					Err(e) => {
						let message =
							e.upstream_message().unwrap_or_else(|| self.policy.fallback_message.clone());

						(Err(RefreshFailure { message }), Some(Box::new(e)))
					},
				}
			})
			.await;

		if outcome.is_err() {
			self.logout().await;
		}

		let waiters = cycle.settle(&outcome);

		self.finish_cycle(outcome, source, waiters)
	}

	fn finish_cycle(
		&self,
		outcome: CycleOutcome,
		source: Option<Box<ProviderError>>,
		waiters: usize,
	) -> Result<AccessToken> {
		match outcome {
			Ok(token) => {
				obs::record_event(GuardEvent::TokenPublished { waiters });
				obs::record_refresh_outcome(RefreshOutcome::Success);
				self.metrics.record_success();

				Ok(token)
			},
			Err(failure) => {
				obs::record_event(GuardEvent::RefreshFailed { waiters });
				obs::record_refresh_outcome(RefreshOutcome::Failure);
				self.metrics.record_failure();

				Err(failure_error(failure, source))
			},
		}
	}

	async fn replay<N>(
		&self,
		request: &HttpRequest,
		token: &AccessToken,
		next: &N,
	) -> Result<HttpResponse>
	where
		N: ?Sized + Next,
	{
		let replayed = self.attach_token(request, token)?;

		self.metrics.record_replay();

		let response = next.handle(replayed).await?;

		if http::is_failure(response.status()) {
			Err(StatusError::from_response(response).into())
		} else {
			Ok(response)
		}
	}

	async fn logout(&self) {
		obs::record_event(GuardEvent::Logout);
		obs::record_logout();
		self.metrics.record_logout();

		if self.provider.logout().await.is_err() {
			obs::record_event(GuardEvent::LogoutFailed);
		}
	}

	fn fallback_failure(&self) -> RefreshFailure {
		RefreshFailure { message: self.policy.fallback_message.clone() }
	}

	fn fallback_error(&self) -> Error {
		failure_error(self.fallback_failure(), None)
	}
}
impl<P> Clone for RefreshGuard<P>
where
	P: ?Sized + AuthenticationProvider,
{
	fn clone(&self) -> Self {
		Self {
			provider: Arc::clone(&self.provider),
			policy: Arc::clone(&self.policy),
			state: self.state.clone(),
			metrics: Arc::clone(&self.metrics),
		}
	}
}
impl<P> Debug for RefreshGuard<P>
where
	P: ?Sized + AuthenticationProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshGuard")
			.field("policy", &self.policy)
			.field("state", &self.state())
			.field("pending_waiters", &self.pending_waiters())
			.finish()
	}
}

/// Binds a [`RefreshGuard`] to the [`Next`] handler it protects.
pub struct GuardedClient<N, P>
where
	N: ?Sized + Next,
	P: ?Sized + AuthenticationProvider,
{
	next: Arc<N>,
	guard: RefreshGuard<P>,
}
impl<N, P> GuardedClient<N, P>
where
	N: ?Sized + Next,
	P: ?Sized + AuthenticationProvider,
{
	/// Pairs `guard` with `next`.
	pub fn new(next: Arc<N>, guard: RefreshGuard<P>) -> Self {
		Self { next, guard }
	}

	/// Sends `request` through the guard.
	pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
		self.guard.intercept(request, &*self.next).await
	}

	/// Guard protecting this client.
	pub fn guard(&self) -> &RefreshGuard<P> {
		&self.guard
	}

	/// Handler receiving guarded requests.
	pub fn next(&self) -> &Arc<N> {
		&self.next
	}
}
impl<N, P> Clone for GuardedClient<N, P>
where
	N: ?Sized + Next,
	P: ?Sized + AuthenticationProvider,
{
	fn clone(&self) -> Self {
		Self { next: Arc::clone(&self.next), guard: self.guard.clone() }
	}
}
impl<N, P> Debug for GuardedClient<N, P>
where
	N: ?Sized + Next,
	P: ?Sized + AuthenticationProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GuardedClient").field("guard", &self.guard).finish()
	}
}

fn failure_error(failure: RefreshFailure, source: Option<Box<ProviderError>>) -> Error {
	Error::RefreshFailed { message: failure.message, source }
}
