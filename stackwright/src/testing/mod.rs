//! Testing utilities for stackwright deployments.
//!
//! This module provides deterministic in-memory collaborators:
//! - [`FakeProvisioner`], a stack service with change sets and events
//! - [`FakeObjectStore`] and [`StaticIdentity`] for packaging
//! - [`SequentialTokenSource`] for predictable correlation tokens

mod provisioner;
mod storage;
mod tokens;

pub use provisioner::FakeProvisioner;
pub use storage::{FakeObjectStore, StaticIdentity};
pub use tokens::SequentialTokenSource;
