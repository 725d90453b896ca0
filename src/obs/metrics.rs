// self
use crate::obs::RefreshOutcome;

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_refresh_guard_refresh_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a guard-triggered logout via the global metrics recorder (when enabled).
pub fn record_logout() {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_refresh_guard_logout_total").increment(1);
	}
}
