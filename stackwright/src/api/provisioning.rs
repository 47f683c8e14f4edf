//! Stack provisioning API seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{
    ChangeSetStatus, ChangeSetType, Parameter, ResourceChange, Stack, StackEvent,
    StackResourceSummary, TemplateParameter, TemplateSource,
};
use crate::errors::ApiError;

/// Input for creating a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChangeSetInput {
    /// Name of the change set.
    pub change_set_name: String,
    /// Target stack name.
    pub stack_name: String,
    /// Create or Update.
    pub change_set_type: ChangeSetType,
    /// Template body, or reuse the current one.
    pub template: TemplateSource,
    /// Parameter values.
    pub parameters: Vec<Parameter>,
    /// Stack tags.
    pub tags: BTreeMap<String, String>,
    /// Notification ARNs.
    pub notification_arns: Vec<String>,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
    /// Fully-qualified service role ARN.
    pub role_arn: Option<String>,
    /// Correlation token.
    pub client_token: String,
}

/// Identifiers returned when a change set is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetHandle {
    /// Change set ID.
    pub change_set_id: String,
    /// ID of the (possibly newly created) stack.
    pub stack_id: String,
}

/// A change set as returned by a describe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetDescription {
    /// Change set ID.
    pub change_set_id: String,
    /// Owning stack ID.
    pub stack_id: String,
    /// Current status.
    pub status: ChangeSetStatus,
    /// Provider explanation of the status.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Planned resource changes, in provider order.
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
}

/// Which rendition of a template to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateStage {
    /// The template as submitted.
    Original,
    /// The template after transforms were expanded.
    Processed,
}

/// Input for deleting a stack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteStackInput {
    /// Stack name or ID.
    pub stack_name: String,
    /// Correlation token.
    pub client_token: String,
    /// Logical IDs to leave in place.
    pub retain_resources: Vec<String>,
}

/// One page of stack events, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StackEventPage {
    /// Events on this page, newest first.
    pub events: Vec<StackEvent>,
    /// Token for the next (older) page.
    pub next_token: Option<String>,
}

/// The remote stack provisioning service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Describes a stack by name or ID; `None` if it does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<Stack>, ApiError>;

    /// Creates a change set.
    async fn create_change_set(
        &self,
        input: CreateChangeSetInput,
    ) -> Result<ChangeSetHandle, ApiError>;

    /// Describes a change set by ID.
    async fn describe_change_set(
        &self,
        change_set_id: &str,
    ) -> Result<ChangeSetDescription, ApiError>;

    /// Executes a change set.
    async fn execute_change_set(
        &self,
        change_set_id: &str,
        client_token: &str,
    ) -> Result<(), ApiError>;

    /// Deletes a change set.
    async fn delete_change_set(&self, change_set_id: &str) -> Result<(), ApiError>;

    /// Fetches the template associated with a change set.
    async fn get_template(
        &self,
        change_set_id: &str,
        stage: TemplateStage,
    ) -> Result<String, ApiError>;

    /// Deletes a stack.
    async fn delete_stack(&self, input: DeleteStackInput) -> Result<(), ApiError>;

    /// Lists one page of a stack's events, newest first.
    async fn describe_stack_events(
        &self,
        stack_id: &str,
        next_token: Option<String>,
    ) -> Result<StackEventPage, ApiError>;

    /// Lists every resource in a stack.
    async fn list_stack_resources(
        &self,
        stack_id: &str,
    ) -> Result<Vec<StackResourceSummary>, ApiError>;

    /// Validates a template body and returns its declared parameters.
    async fn validate_template(
        &self,
        template_body: &str,
    ) -> Result<Vec<TemplateParameter>, ApiError>;

    /// Replaces a stack's policy.
    async fn set_stack_policy(&self, stack_id: &str, policy_body: &str) -> Result<(), ApiError>;
}
