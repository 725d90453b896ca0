// self
use crate::{_prelude::*, obs::GuardEvent};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFuture<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFuture<F> = F;

/// A span builder used by the guard.
#[derive(Clone, Debug)]
pub struct GuardSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GuardSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bearer_refresh_guard.guard", stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFuture<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a structured event for a guard transition (when tracing is enabled).
pub fn record_event(event: GuardEvent) {
	#[cfg(feature = "tracing")]
	{
		match event {
			GuardEvent::RefreshStarted(trigger) =>
				tracing::debug!(trigger = trigger.as_str(), "token refresh started"),
			GuardEvent::WaiterEnqueued => tracing::debug!("request queued behind running refresh"),
			GuardEvent::TokenPublished { waiters } =>
				tracing::debug!(waiters, "refreshed token published"),
			GuardEvent::TokenReused => tracing::debug!("replaying with already published token"),
			GuardEvent::RefreshFailed { waiters } =>
				tracing::warn!(waiters, "token refresh failed"),
			GuardEvent::Logout => tracing::info!("logging out after terminal authorization failure"),
			GuardEvent::LogoutFailed => tracing::warn!("provider failed to log out"),
		}
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_noop_without_tracing() {
		record_event(GuardEvent::TokenPublished { waiters: 2 });
		record_event(GuardEvent::LogoutFailed);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = GuardSpan::new("instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
