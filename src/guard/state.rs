//! Refresh state machine and waiter queue shared by clones of a guard.
//!
//! The mutex is only held for synchronous check-and-set sections; no lock guard ever lives
//! across an `.await`. Waiters park on one-shot receivers whose senders sit in the queue until
//! the running cycle settles.

// std
use std::mem;
// crates.io
use futures::channel::oneshot;
// self
use crate::{_prelude::*, auth::AccessToken};

/// Refresh phase of a guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
	/// No refresh is running.
	#[default]
	Idle,
	/// A refresh cycle is running; new authorization failures queue behind it.
	Refreshing,
}

/// Failure broadcast to every waiter of a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RefreshFailure {
	pub(crate) message: String,
}

pub(crate) type CycleOutcome = Result<AccessToken, RefreshFailure>;

type WaiterQueue = Vec<oneshot::Sender<CycleOutcome>>;

#[derive(Debug, Default)]
struct GuardState {
	phase: RefreshState,
	published: Option<AccessToken>,
	waiters: WaiterQueue,
}

/// Position a request takes after an authorization failure.
pub(crate) enum Ticket {
	/// The request started the cycle and must run the refresh.
	Leader(RefreshCycle),
	/// A cycle is already running; the request waits for its outcome.
	Waiter(oneshot::Receiver<CycleOutcome>),
	/// A cycle settled after the request went out; replay with the token it published.
	Published(AccessToken),
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SharedState(Arc<Mutex<GuardState>>);
impl SharedState {
	pub(crate) fn phase(&self) -> RefreshState {
		self.0.lock().phase
	}

	pub(crate) fn published(&self) -> Option<AccessToken> {
		self.0.lock().published.clone()
	}

	pub(crate) fn pending_waiters(&self) -> usize {
		self.0.lock().waiters.len()
	}

	/// Starts a cycle when idle, otherwise enqueues a waiter.
	///
	/// `sent` is the token the failed request carried and `current` the provider's token now.
	/// An idle guard whose published token is still current but differs from `sent` hands that
	/// token out instead of starting another cycle. `abandon_message` is broadcast if the leader
	/// drops the cycle without settling it.
	pub(crate) fn begin_or_join(
		&self,
		sent: Option<&AccessToken>,
		current: Option<&AccessToken>,
		abandon_message: &str,
	) -> Ticket {
		let mut state = self.0.lock();

		match state.phase {
			RefreshState::Idle => {
				let reusable = state
					.published
					.as_ref()
					.filter(|published| Some(*published) != sent && Some(*published) == current);

				if let Some(published) = reusable {
					return Ticket::Published(published.clone());
				}

				state.phase = RefreshState::Refreshing;
				state.published = None;

				Ticket::Leader(RefreshCycle {
					state: self.clone(),
					abandon_message: abandon_message.to_owned(),
					settled: false,
				})
			},
			RefreshState::Refreshing => {
				let (tx, rx) = oneshot::channel();

				state.waiters.push(tx);

				Ticket::Waiter(rx)
			},
		}
	}

	fn finish(&self, outcome: &CycleOutcome) -> usize {
		let waiters = {
			let mut state = self.0.lock();

			state.phase = RefreshState::Idle;

			if let Ok(token) = outcome {
				state.published = Some(token.clone());
			}

			mem::take(&mut state.waiters)
		};
		let released = waiters.len();

		for waiter in waiters {
			// A dropped receiver means that caller stopped waiting.
			let _ = waiter.send(outcome.clone());
		}

		released
	}
}

/// Exclusive handle on the running refresh cycle.
///
/// Dropping an unsettled cycle resets the guard to idle and releases every waiter with the
/// abandon message.
pub(crate) struct RefreshCycle {
	state: SharedState,
	abandon_message: String,
	settled: bool,
}
impl RefreshCycle {
	/// Publishes `outcome`, returns to idle, and drains the waiter queue.
	///
	/// Returns the number of waiters released.
	pub(crate) fn settle(mut self, outcome: &CycleOutcome) -> usize {
		self.settled = true;

		self.state.finish(outcome)
	}
}
impl Drop for RefreshCycle {
	fn drop(&mut self) {
		if !self.settled {
			let failure = RefreshFailure { message: mem::take(&mut self.abandon_message) };

			self.state.finish(&Err(failure));
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn leader(ticket: Ticket) -> RefreshCycle {
		match ticket {
			Ticket::Leader(cycle) => cycle,
			_ => panic!("Expected the first ticket to lead the cycle."),
		}
	}

	fn waiter(ticket: Ticket) -> oneshot::Receiver<CycleOutcome> {
		match ticket {
			Ticket::Waiter(rx) => rx,
			_ => panic!("Expected a waiter while a cycle is running."),
		}
	}

	#[test]
	fn only_one_leader_per_cycle() {
		let state = SharedState::default();
		let cycle = leader(state.begin_or_join(None, None, "abandoned"));

		assert_eq!(state.phase(), RefreshState::Refreshing);

		let mut first = waiter(state.begin_or_join(None, None, "abandoned"));
		let mut second = waiter(state.begin_or_join(None, None, "abandoned"));

		assert_eq!(state.pending_waiters(), 2);
		assert_eq!(cycle.settle(&Ok(AccessToken::new("newTok"))), 2);
		assert_eq!(state.phase(), RefreshState::Idle);
		assert_eq!(state.pending_waiters(), 0);
		assert_eq!(state.published().map(|token| token.expose().to_owned()), Some("newTok".into()));

		for rx in [&mut first, &mut second] {
			let outcome = rx
				.try_recv()
				.expect("Waiter channel should stay open.")
				.expect("Waiter should be released on settle.");

			assert_eq!(outcome.map(|token| token.expose().to_owned()), Ok("newTok".into()));
		}
	}

	#[test]
	fn new_cycle_clears_published_token() {
		let state = SharedState::default();

		leader(state.begin_or_join(None, None, "abandoned")).settle(&Ok(AccessToken::new("first")));

		assert!(state.published().is_some());

		let cycle = leader(state.begin_or_join(None, None, "abandoned"));

		assert!(state.published().is_none());

		cycle.settle(&Err(RefreshFailure { message: "bad".into() }));

		assert!(state.published().is_none());
		assert_eq!(state.phase(), RefreshState::Idle);
	}

	#[test]
	fn settled_token_is_reused_by_late_stale_failures() {
		let state = SharedState::default();
		let stale = AccessToken::new("stale");
		let fresh = AccessToken::new("newTok");

		leader(state.begin_or_join(Some(&stale), Some(&stale), "abandoned"))
			.settle(&Ok(fresh.clone()));

		match state.begin_or_join(Some(&stale), Some(&fresh), "abandoned") {
			Ticket::Published(token) => assert_eq!(token, fresh),
			_ => panic!("Expected the published token to be reused."),
		}

		assert_eq!(state.phase(), RefreshState::Idle);

		// The published token itself was rejected, so it has expired too.
		leader(state.begin_or_join(Some(&fresh), Some(&fresh), "abandoned"))
			.settle(&Ok(AccessToken::new("t2")));

		// The provider moved on to a token this guard never published.
		let replaced = AccessToken::new("signed-in");
		let cycle = leader(state.begin_or_join(Some(&stale), Some(&replaced), "abandoned"));

		assert_eq!(state.phase(), RefreshState::Refreshing);

		drop(cycle);
	}

	#[test]
	fn dropping_unsettled_cycle_releases_waiters() {
		let state = SharedState::default();
		let cycle = leader(state.begin_or_join(None, None, "Refresh Token error"));
		let mut rx = waiter(state.begin_or_join(None, None, "Refresh Token error"));

		drop(cycle);

		assert_eq!(state.phase(), RefreshState::Idle);

		let outcome =
			rx.try_recv().expect("Waiter channel should stay open.").expect("Waiter should be released.");

		assert_eq!(outcome, Err(RefreshFailure { message: "Refresh Token error".into() }));
	}

	#[test]
	fn dropped_waiters_do_not_block_settle() {
		let state = SharedState::default();
		let cycle = leader(state.begin_or_join(None, None, "abandoned"));

		drop(waiter(state.begin_or_join(None, None, "abandoned")));

		assert_eq!(cycle.settle(&Ok(AccessToken::new("t"))), 1);
		assert_eq!(state.phase(), RefreshState::Idle);
	}
}
