//! Prepared deployment record.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::{ChangeSetType, ResourceChange};
use crate::errors::{DeployError, Result};

/// A change set that has been created and reviewed but not executed.
///
/// Saved between a "plan" step and a later "apply" step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedDeployment {
    /// Stack name.
    pub stack_name: String,
    /// Stack id; the stack exists (possibly in review) once prepared.
    pub stack_id: String,
    /// Change set id.
    pub change_set_id: String,
    /// Whether the change set creates or updates the stack.
    pub change_set_type: ChangeSetType,
    /// Resource changes the change set will apply.
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
    /// The template after provider-side transforms.
    pub processed_template: String,
}

impl PreparedDeployment {
    /// Writes the record as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| DeployError::io(path, e))
    }

    /// Reads a record written by [`PreparedDeployment::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prepared() -> PreparedDeployment {
        PreparedDeployment {
            stack_name: "web".to_string(),
            stack_id: "arn:aws:cloudformation:us-east-1:123456789012:stack/web/1".to_string(),
            change_set_id: "arn:aws:cloudformation:us-east-1:123456789012:changeSet/web-csid-1/2"
                .to_string(),
            change_set_type: ChangeSetType::Update,
            changes: vec![ResourceChange {
                action: "Modify".to_string(),
                logical_resource_id: "Queue".to_string(),
                physical_resource_id: Some("web-Queue".to_string()),
                resource_type: "AWS::SQS::Queue".to_string(),
                replacement: Some("False".to_string()),
            }],
            processed_template: "Resources:\n  Queue:\n    Type: AWS::SQS::Queue\n".to_string(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");

        prepared().save(&path).unwrap();
        assert_eq!(PreparedDeployment::load(&path).unwrap(), prepared());
    }

    #[test]
    fn test_saved_json_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        prepared().save(&path).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\n  \"change_set_type\": \"UPDATE\""));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PreparedDeployment::load(Path::new("/no/such/plan.json")).unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
    }
}
