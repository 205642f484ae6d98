//! Optional observability helpers for refresh episodes.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_session.refresh` with a `stage`
//!   field, plus debug/warn events for queueing, replay, and termination.
//! - Enable `metrics` to increment the `bearer_session_refresh_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages of the session protocol observed by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Refresh exchange against the refresh endpoint.
	Exchange,
	/// Resubmission of a queued or stale request with a fresh credential.
	Replay,
	/// Non-expiry 401 handled without a refresh.
	Reject,
	/// Session termination after an irrecoverable failure.
	Terminate,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Exchange => "exchange",
			Stage::Replay => "replay",
			Stage::Reject => "reject",
			Stage::Terminate => "terminate",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
