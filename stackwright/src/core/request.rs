//! Deployment request handed to the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Parameter;

/// Where the template for a deployment comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum TemplateSource {
    /// A template body to deploy.
    Body(String),
    /// Keep the template the stack is currently running.
    UsePrevious,
}

/// Everything needed to deploy one stack.
///
/// The orchestrator never mutates a request it is given; parameter
/// population works on a private copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Target stack name.
    pub stack_name: String,
    /// Template to deploy.
    pub template: TemplateSource,
    /// Explicit parameter values.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Stack tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Notification topic ARNs.
    #[serde(default)]
    pub notification_arns: Vec<String>,
    /// Service role, either a full ARN or a bare role name.
    #[serde(default)]
    pub role: Option<String>,
    /// Stack policy applied after a successful deployment.
    #[serde(default)]
    pub stack_policy_body: Option<String>,
    /// Fill in parameters the caller did not supply with their previous values.
    #[serde(default)]
    pub populate_missing: bool,
}

impl DeploymentRequest {
    /// Creates a request deploying `template_body` to `stack_name`.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, template_body: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            template: TemplateSource::Body(template_body.into()),
            parameters: Vec::new(),
            tags: BTreeMap::new(),
            notification_arns: Vec::new(),
            role: None,
            stack_policy_body: None,
            populate_missing: false,
        }
    }

    /// Creates a request that reuses the stack's current template.
    #[must_use]
    pub fn reuse_template(stack_name: impl Into<String>) -> Self {
        Self {
            template: TemplateSource::UsePrevious,
            ..Self::new(stack_name, String::new())
        }
    }

    /// Adds a parameter value.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(key, value));
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds a notification ARN.
    #[must_use]
    pub fn with_notification_arn(mut self, arn: impl Into<String>) -> Self {
        self.notification_arns.push(arn.into());
        self
    }

    /// Sets the service role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the stack policy body.
    #[must_use]
    pub fn with_stack_policy(mut self, body: impl Into<String>) -> Self {
        self.stack_policy_body = Some(body.into());
        self
    }

    /// Enables or disables populating missing parameters.
    #[must_use]
    pub fn with_populate_missing(mut self, populate: bool) -> Self {
        self.populate_missing = populate;
        self
    }

    /// Returns true if a parameter named `key` was supplied.
    #[must_use]
    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.iter().any(|p| p.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = DeploymentRequest::new("demo", "Resources: {}")
            .with_parameter("Env", "prod")
            .with_tag("team", "infra")
            .with_role("deployer")
            .with_populate_missing(true);

        assert_eq!(request.stack_name, "demo");
        assert!(request.has_parameter("Env"));
        assert!(!request.has_parameter("Size"));
        assert_eq!(request.tags.get("team").map(String::as_str), Some("infra"));
        assert_eq!(request.role.as_deref(), Some("deployer"));
        assert!(request.populate_missing);
    }

    #[test]
    fn test_reuse_template() {
        let request = DeploymentRequest::reuse_template("demo");
        assert_eq!(request.template, TemplateSource::UsePrevious);
    }
}
