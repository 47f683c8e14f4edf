//! # Stackwright
//!
//! Change-set-driven deployment of declarative infrastructure templates.
//!
//! Stackwright covers the client side of a stack deployment:
//!
//! - **Document model**: YAML templates with anchors, merge keys and tags
//!   preserved, plus a registry of properties that point at local artifacts
//! - **Artifact packaging**: archive, hash and upload local artifacts once,
//!   then rewrite the template to reference the uploaded objects
//! - **Change sets**: create, wait for and execute change sets, treating
//!   "nothing to change" as a normal outcome
//! - **Event streaming**: follow a stack operation's events oldest-first
//!   until the stack settles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackwright::prelude::*;
//!
//! let orchestrator = StackOrchestrator::new(provisioner, identity, DeployConfig::new());
//! let request = DeploymentRequest::new("web", template_body).with_role("deployer");
//!
//! match orchestrator.up(&request, &LoggingEventSink::default()).await? {
//!     UpOutcome::Succeeded { outputs, .. } => println!("{outputs:?}"),
//!     UpOutcome::NoOp => println!("nothing to deploy"),
//!     UpOutcome::Failed { status, .. } => eprintln!("deployment ended in {status}"),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod deploy;
pub mod document;
pub mod errors;
pub mod events;
pub mod observability;
pub mod packager;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::api::{IdentityApi, ObjectStorageApi, ProvisioningApi};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{DeployConfig, PackagerConfig};
    pub use crate::core::{
        DeploymentRequest, Parameter, Stack, StackEvent, StackStatus, TailEvent, TemplateSource,
    };
    pub use crate::deploy::{
        DownOutcome, PrepareOutcome, PreparedDeployment, StackOrchestrator, UpOutcome,
    };
    pub use crate::document::{Document, DocumentError, PackageableRegistry};
    pub use crate::errors::{ApiError, DeployError};
    pub use crate::events::{
        ChannelEventSink, CollectingEventSink, LoggingEventSink, NoOpEventSink, StackEventSink,
    };
    pub use crate::packager::{PackagedTemplate, Packager};
}
