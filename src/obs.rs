//! Optional observability helpers for guarded requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_refresh_guard.guard` with a `stage`
//!   field, plus events for refresh start, publication, waiter release, and logout.
//! - Enable `metrics` to increment the `bearer_refresh_guard_refresh_total` counter for every
//!   refresh attempt, success, or failure (labeled by `outcome`) and the
//!   `bearer_refresh_guard_logout_total` counter for every guard-triggered logout.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A cycle started.
	Attempt,
	/// The cycle published a new token.
	Success,
	/// The cycle failed and the session was logged out.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Notable guard transitions reported through [`record_event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardEvent {
	/// A refresh cycle started after the given failure class.
	RefreshStarted(crate::error::AuthFailure),
	/// A request queued behind the running cycle.
	WaiterEnqueued,
	/// A refresh produced a token and released the given number of waiters.
	TokenPublished {
		/// Waiters released alongside publication.
		waiters: usize,
	},
	/// A late failure replayed with the token an already settled cycle published.
	TokenReused,
	/// A refresh failed and released the given number of waiters with the failure.
	RefreshFailed {
		/// Waiters released with the failure.
		waiters: usize,
	},
	/// The guard asked the provider to log out.
	Logout,
	/// The provider failed to log out.
	LogoutFailed,
}
