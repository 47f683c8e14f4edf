//! Stack and change set status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a stack, or of a single resource within a stack event.
///
/// Stack events reuse the stack status vocabulary for their resource
/// status. Values the provider adds later are carried in [`StackStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StackStatus {
    /// CREATE_IN_PROGRESS
    CreateInProgress,
    /// CREATE_FAILED
    CreateFailed,
    /// CREATE_COMPLETE
    CreateComplete,
    /// ROLLBACK_IN_PROGRESS
    RollbackInProgress,
    /// ROLLBACK_FAILED
    RollbackFailed,
    /// ROLLBACK_COMPLETE
    RollbackComplete,
    /// DELETE_IN_PROGRESS
    DeleteInProgress,
    /// DELETE_FAILED
    DeleteFailed,
    /// DELETE_COMPLETE
    DeleteComplete,
    /// DELETE_SKIPPED
    DeleteSkipped,
    /// UPDATE_IN_PROGRESS
    UpdateInProgress,
    /// UPDATE_COMPLETE_CLEANUP_IN_PROGRESS
    UpdateCompleteCleanupInProgress,
    /// UPDATE_COMPLETE
    UpdateComplete,
    /// UPDATE_FAILED
    UpdateFailed,
    /// UPDATE_ROLLBACK_IN_PROGRESS
    UpdateRollbackInProgress,
    /// UPDATE_ROLLBACK_FAILED
    UpdateRollbackFailed,
    /// UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS
    UpdateRollbackCompleteCleanupInProgress,
    /// UPDATE_ROLLBACK_COMPLETE
    UpdateRollbackComplete,
    /// REVIEW_IN_PROGRESS
    ReviewInProgress,
    /// Any status not listed above.
    Other(String),
}

const KNOWN_STATUSES: &[(&str, StackStatus)] = &[
    ("CREATE_IN_PROGRESS", StackStatus::CreateInProgress),
    ("CREATE_FAILED", StackStatus::CreateFailed),
    ("CREATE_COMPLETE", StackStatus::CreateComplete),
    ("ROLLBACK_IN_PROGRESS", StackStatus::RollbackInProgress),
    ("ROLLBACK_FAILED", StackStatus::RollbackFailed),
    ("ROLLBACK_COMPLETE", StackStatus::RollbackComplete),
    ("DELETE_IN_PROGRESS", StackStatus::DeleteInProgress),
    ("DELETE_FAILED", StackStatus::DeleteFailed),
    ("DELETE_COMPLETE", StackStatus::DeleteComplete),
    ("DELETE_SKIPPED", StackStatus::DeleteSkipped),
    ("UPDATE_IN_PROGRESS", StackStatus::UpdateInProgress),
    (
        "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
        StackStatus::UpdateCompleteCleanupInProgress,
    ),
    ("UPDATE_COMPLETE", StackStatus::UpdateComplete),
    ("UPDATE_FAILED", StackStatus::UpdateFailed),
    ("UPDATE_ROLLBACK_IN_PROGRESS", StackStatus::UpdateRollbackInProgress),
    ("UPDATE_ROLLBACK_FAILED", StackStatus::UpdateRollbackFailed),
    (
        "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
        StackStatus::UpdateRollbackCompleteCleanupInProgress,
    ),
    ("UPDATE_ROLLBACK_COMPLETE", StackStatus::UpdateRollbackComplete),
    ("REVIEW_IN_PROGRESS", StackStatus::ReviewInProgress),
];

impl StackStatus {
    /// Returns the provider's wire name for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Other(raw) = self {
            return raw;
        }
        KNOWN_STATUSES
            .iter()
            .find(|(_, status)| status == self)
            .map_or("", |(name, _)| name)
    }

    /// Returns true if no further transition will happen without a new
    /// operation.
    ///
    /// Exactly ten statuses are terminal; every `*_IN_PROGRESS` status,
    /// `REVIEW_IN_PROGRESS` and unknown values are not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete
                | Self::DeleteComplete
                | Self::CreateFailed
                | Self::DeleteFailed
                | Self::RollbackComplete
                | Self::RollbackFailed
                | Self::UpdateComplete
                | Self::UpdateFailed
                | Self::UpdateRollbackComplete
                | Self::UpdateRollbackFailed
        )
    }

    /// Returns true for the two statuses that mean a deployment succeeded.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::CreateComplete | Self::UpdateComplete)
    }
}

/// Returns true if `status` names one of the ten terminal stack statuses.
#[must_use]
pub fn is_terminal_status(status: &str) -> bool {
    StackStatus::from(status).is_terminal()
}

impl From<&str> for StackStatus {
    fn from(value: &str) -> Self {
        KNOWN_STATUSES
            .iter()
            .find(|(name, _)| *name == value)
            .map_or_else(|| Self::Other(value.to_string()), |(_, status)| status.clone())
    }
}

impl From<String> for StackStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<StackStatus> for String {
    fn from(value: StackStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a change set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeSetStatus {
    /// CREATE_PENDING
    CreatePending,
    /// CREATE_IN_PROGRESS
    CreateInProgress,
    /// CREATE_COMPLETE
    CreateComplete,
    /// DELETE_PENDING
    DeletePending,
    /// DELETE_IN_PROGRESS
    DeleteInProgress,
    /// DELETE_COMPLETE
    DeleteComplete,
    /// DELETE_FAILED
    DeleteFailed,
    /// FAILED
    Failed,
    /// Any status not listed above.
    Other(String),
}

impl ChangeSetStatus {
    /// Returns the provider's wire name for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreatePending => "CREATE_PENDING",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::DeletePending => "DELETE_PENDING",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::Failed => "FAILED",
            Self::Other(raw) => raw,
        }
    }

    /// Returns true once the change set has stabilized, been deleted or failed.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::DeleteComplete | Self::Failed
        )
    }
}

impl From<&str> for ChangeSetStatus {
    fn from(value: &str) -> Self {
        match value {
            "CREATE_PENDING" => Self::CreatePending,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "DELETE_PENDING" => Self::DeletePending,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ChangeSetStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ChangeSetStatus> for String {
    fn from(value: ChangeSetStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a change set creates a new stack or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeSetType {
    /// The stack does not exist yet.
    Create,
    /// The stack exists and will be updated.
    Update,
}

impl fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMINAL: [&str; 10] = [
        "CREATE_COMPLETE",
        "DELETE_COMPLETE",
        "CREATE_FAILED",
        "DELETE_FAILED",
        "ROLLBACK_COMPLETE",
        "ROLLBACK_FAILED",
        "UPDATE_COMPLETE",
        "UPDATE_FAILED",
        "UPDATE_ROLLBACK_COMPLETE",
        "UPDATE_ROLLBACK_FAILED",
    ];

    #[test]
    fn test_exactly_ten_terminal_statuses() {
        for name in TERMINAL {
            assert!(is_terminal_status(name), "{name} should be terminal");
        }

        let terminal_known = KNOWN_STATUSES
            .iter()
            .filter(|(_, status)| status.is_terminal())
            .count();
        assert_eq!(terminal_known, 10);
    }

    #[test]
    fn test_non_terminal_statuses() {
        for name in [
            "CREATE_IN_PROGRESS",
            "REVIEW_IN_PROGRESS",
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
            "DELETE_SKIPPED",
            "IMPORT_COMPLETE",
            "",
        ] {
            assert!(!is_terminal_status(name), "{name} should not be terminal");
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for (name, status) in KNOWN_STATUSES {
            assert_eq!(StackStatus::from(*name), *status);
            assert_eq!(status.as_str(), *name);
        }
        let other = StackStatus::from("IMPORT_IN_PROGRESS");
        assert_eq!(other, StackStatus::Other("IMPORT_IN_PROGRESS".to_string()));
        assert_eq!(other.to_string(), "IMPORT_IN_PROGRESS");
    }

    #[test]
    fn test_status_serde_uses_wire_names() {
        let json = serde_json::to_string(&StackStatus::UpdateRollbackComplete).unwrap();
        assert_eq!(json, "\"UPDATE_ROLLBACK_COMPLETE\"");

        let parsed: ChangeSetStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, ChangeSetStatus::Failed);
    }

    #[test]
    fn test_successful_statuses() {
        assert!(StackStatus::CreateComplete.is_successful());
        assert!(StackStatus::UpdateComplete.is_successful());
        assert!(!StackStatus::UpdateRollbackComplete.is_successful());
    }

    #[test]
    fn test_change_set_settled() {
        assert!(ChangeSetStatus::CreateComplete.is_settled());
        assert!(ChangeSetStatus::DeleteComplete.is_settled());
        assert!(ChangeSetStatus::Failed.is_settled());
        assert!(!ChangeSetStatus::CreatePending.is_settled());
        assert!(!ChangeSetStatus::DeleteFailed.is_settled());
    }
}
