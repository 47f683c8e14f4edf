//! Remote stack state as reported by the provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::StackStatus;

/// A template parameter value passed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub key: String,
    /// Explicit value, absent when reusing the previous value.
    #[serde(default)]
    pub value: Option<String>,
    /// Keep whatever value the stack currently has.
    #[serde(default)]
    pub use_previous_value: bool,
}

impl Parameter {
    /// Creates a parameter with an explicit value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            use_previous_value: false,
        }
    }

    /// Creates a parameter that keeps the stack's current value.
    #[must_use]
    pub fn use_previous(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            use_previous_value: true,
        }
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Output name.
    pub key: String,
    /// Output value.
    pub value: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A stack as returned by a describe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Provider-assigned stack ID.
    pub stack_id: String,
    /// Stack name.
    pub stack_name: String,
    /// Current status.
    pub status: StackStatus,
    /// Provider explanation of the status.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Current parameter values.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Current outputs.
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl Stack {
    /// Returns the outputs as an ordered name to value map.
    #[must_use]
    pub fn output_map(&self) -> BTreeMap<String, String> {
        self.outputs
            .iter()
            .map(|o| (o.key.clone(), o.value.clone()))
            .collect()
    }
}

/// One planned change inside a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Add, Modify, Remove, Import or Dynamic.
    pub action: String,
    /// Logical ID of the affected resource.
    pub logical_resource_id: String,
    /// Physical ID, for existing resources.
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// "True", "False" or "Conditional" for modifications.
    #[serde(default)]
    pub replacement: Option<String>,
}

/// Summary of a resource currently in a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResourceSummary {
    /// Logical ID.
    pub logical_resource_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Current status.
    pub status: StackStatus,
}

/// A parameter declared by a template, as reported by template validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParameter {
    /// Parameter name.
    pub key: String,
    /// Default value, if the template declares one.
    #[serde(default)]
    pub default_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_constructors() {
        let explicit = Parameter::new("Env", "prod");
        assert_eq!(explicit.value.as_deref(), Some("prod"));
        assert!(!explicit.use_previous_value);

        let previous = Parameter::use_previous("Env");
        assert!(previous.value.is_none());
        assert!(previous.use_previous_value);
    }

    #[test]
    fn test_output_map_is_sorted() {
        let stack = Stack {
            stack_id: "id".to_string(),
            stack_name: "demo".to_string(),
            status: StackStatus::CreateComplete,
            status_reason: None,
            parameters: Vec::new(),
            outputs: vec![
                StackOutput {
                    key: "Zeta".to_string(),
                    value: "z".to_string(),
                    description: None,
                },
                StackOutput {
                    key: "Alpha".to_string(),
                    value: "a".to_string(),
                    description: None,
                },
            ],
        };

        let keys: Vec<_> = stack.output_map().into_keys().collect();
        assert_eq!(keys, vec!["Alpha", "Zeta"]);
    }
}
