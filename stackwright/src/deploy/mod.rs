//! Stack deployment.
//!
//! [`StackOrchestrator`] is the entry point. It relies on:
//! - [`ChangeSetWaiter`] to wait for change sets to be computed
//! - [`EventPoller`] to follow one operation's events to completion
//! - a [`TokenSource`] to tag each operation it starts
//!
//! Throttled describe and list calls are retried by
//! [`with_throttle_retry`]; other remote errors propagate.

mod changeset;
mod orchestrator;
mod poller;
mod prepared;
mod retry;
mod tokens;

pub use changeset::ChangeSetWaiter;
pub use orchestrator::{DownOutcome, PrepareOutcome, StackOrchestrator, UpOutcome};
pub use poller::EventPoller;
pub use prepared::PreparedDeployment;
pub use retry::with_throttle_retry;
pub use tokens::{TokenSource, UuidTokenSource};
