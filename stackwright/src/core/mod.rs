//! Core domain model types for stackwright.
//!
//! This module contains the types shared by every component:
//! - Stack and change set status enums
//! - Stack state, parameters and outputs
//! - Stack events and the tail stream item
//! - The deployment request

mod event;
mod request;
mod stack;
mod status;

pub use event::{StackEvent, TailEvent};
pub use request::{DeploymentRequest, TemplateSource};
pub use stack::{
    Parameter, ResourceChange, Stack, StackOutput, StackResourceSummary, TemplateParameter,
};
pub use status::{is_terminal_status, ChangeSetStatus, ChangeSetType, StackStatus};
