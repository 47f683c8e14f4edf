//! Stack event types delivered by the event poller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::StackStatus;

/// A single entry in a stack's event history.
///
/// Events are produced by the provider and never modified locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// Unique event ID.
    pub event_id: String,
    /// ID of the stack the event belongs to.
    pub stack_id: String,
    /// Name of the stack.
    pub stack_name: String,
    /// Logical ID of the resource (the stack name for stack-level events).
    pub logical_resource_id: String,
    /// Physical ID of the resource, once known.
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    /// Resource type, e.g. "AWS::Lambda::Function".
    pub resource_type: String,
    /// Status reached by the resource.
    pub resource_status: StackStatus,
    /// Provider explanation of the status.
    #[serde(default)]
    pub resource_status_reason: Option<String>,
    /// Token of the operation that caused the event.
    #[serde(default)]
    pub client_request_token: Option<String>,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl StackEvent {
    /// Returns true if this event describes the stack itself rather than
    /// one of its resources.
    #[must_use]
    pub fn is_stack_event(&self) -> bool {
        self.physical_resource_id.as_deref() == Some(self.stack_id.as_str())
            || self.logical_resource_id == self.stack_name
    }
}

impl fmt::Display for StackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.resource_status,
            self.logical_resource_id,
            self.resource_type
        )?;
        if let Some(reason) = &self.resource_status_reason {
            write!(f, " - {reason}")?;
        }
        Ok(())
    }
}

/// An item delivered to an event consumer: either an event or the error
/// that ended the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum TailEvent {
    /// A stack event, delivered oldest-first.
    Event(StackEvent),
    /// The operation being followed failed with this message.
    Error(String),
}

impl TailEvent {
    /// Returns the stack event, if this item carries one.
    #[must_use]
    pub const fn as_event(&self) -> Option<&StackEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Error(_) => None,
        }
    }
}
