//! Structured cancellation utilities.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation of waits and remote calls
//! - SlotTaskGroup for fan-out work whose results are gathered in order

mod task_group;
mod token;

pub use task_group::SlotTaskGroup;
pub use token::CancellationToken;
