//! Stack orchestrator.
//!
//! Drives a stack through readiness checks, change set creation, execution
//! and deletion, streaming every event of the operations it starts to a
//! [`StackEventSink`].

use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::changeset::ChangeSetWaiter;
use super::poller::EventPoller;
use super::prepared::PreparedDeployment;
use super::retry::with_throttle_retry;
use super::tokens::{TokenSource, UuidTokenSource};
use crate::api::{CreateChangeSetInput, DeleteStackInput, IdentityApi, ProvisioningApi, TemplateStage};
use crate::cancellation::CancellationToken;
use crate::config::{tags_from_env, DeployConfig};
use crate::core::{
    ChangeSetType, DeploymentRequest, Parameter, Stack, StackEvent, StackStatus, TailEvent,
    TemplateSource,
};
use crate::errors::{ApiResultExt, DeployError, Result};
use crate::events::StackEventSink;
use crate::observability::OperationTimer;

static STACK_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$"));

/// Result of [`StackOrchestrator::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// A change set is ready to execute.
    Ready(PreparedDeployment),
    /// The request would change nothing; no change set was kept.
    NoOp,
}

/// Result of [`StackOrchestrator::up`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpOutcome {
    /// The stack reached `CREATE_COMPLETE` or `UPDATE_COMPLETE`.
    Succeeded {
        /// Stack id.
        stack_id: String,
        /// Final stack status.
        status: StackStatus,
        /// Stack outputs.
        outputs: BTreeMap<String, String>,
    },
    /// Nothing to change.
    NoOp,
    /// The operation ended in any other terminal status.
    Failed {
        /// Stack id.
        stack_id: String,
        /// Final stack status.
        status: StackStatus,
        /// The last event delivered.
        final_event: StackEvent,
    },
}

impl UpOutcome {
    /// Returns true unless the operation failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Result of [`StackOrchestrator::down`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownOutcome {
    /// There was no stack to delete.
    Absent,
    /// The stack is gone; listed resources were left in place.
    Deleted {
        /// Resources retained after a failed first delete.
        retained_resources: Vec<String>,
    },
    /// The stack still exists after the retrying delete.
    Failed {
        /// Resources the retry asked to retain.
        retained_resources: Vec<String>,
        /// The last event delivered.
        final_event: StackEvent,
    },
}

impl DownOutcome {
    /// Returns true unless the stack failed to delete.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Deploys, inspects and deletes stacks.
pub struct StackOrchestrator {
    api: Arc<dyn ProvisioningApi>,
    identity: Arc<dyn IdentityApi>,
    tokens: Arc<dyn TokenSource>,
    config: DeployConfig,
    cancel: Arc<CancellationToken>,
}

impl StackOrchestrator {
    /// Creates an orchestrator issuing UUID-based tokens.
    #[must_use]
    pub fn new(
        api: Arc<dyn ProvisioningApi>,
        identity: Arc<dyn IdentityApi>,
        config: DeployConfig,
    ) -> Self {
        Self {
            api,
            identity,
            tokens: Arc::new(UuidTokenSource::new(&config.token_prefix)),
            config,
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Replaces the token source.
    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Describes a stack by name or id; `None` if it does not exist.
    pub async fn describe(&self, name: &str) -> Result<Option<Stack>> {
        with_throttle_retry(
            "DescribeStacks",
            self.config.throttle_retry_interval(),
            &self.cancel,
            || self.api.describe_stack(name),
        )
        .await
    }

    /// Brings an existing stack into a state a change set can be applied to.
    ///
    /// An operation in flight is followed to completion. A stack that never
    /// finished creating is deleted.
    pub async fn ensure_stack_ready(&self, name: &str, sink: &dyn StackEventSink) -> Result<()> {
        let Some(stack) = self.describe(name).await? else {
            return Ok(());
        };

        if !stack.status.is_terminal() && stack.status != StackStatus::ReviewInProgress {
            info!(stack = name, status = %stack.status, "waiting for in-flight operation");
            self.follow(&stack.stack_id, None, sink).await?;
        }

        let Some(stack) = self.describe(&stack.stack_id).await? else {
            return Ok(());
        };
        let stale = match stack.status {
            StackStatus::CreateFailed | StackStatus::RollbackComplete => true,
            StackStatus::ReviewInProgress => {
                self.resource_ids(&stack.stack_id, false).await?.is_empty()
            }
            _ => false,
        };
        if stale {
            warn!(stack = name, status = %stack.status, "deleting stack that never finished creating");
            self.delete_and_follow(&stack.stack_id, Vec::new(), sink).await?;
        }
        Ok(())
    }

    /// Marks parameters the request leaves out as "use previous value".
    ///
    /// Reusing the previous template covers every parameter the stack has;
    /// with a new template, every declared parameter without a default.
    pub async fn populate_missing(&self, request: &mut DeploymentRequest, stack: &Stack) -> Result<()> {
        let missing: Vec<String> = match &request.template {
            TemplateSource::UsePrevious => stack
                .parameters
                .iter()
                .map(|p| p.key.clone())
                .collect(),
            TemplateSource::Body(body) => self
                .cancel
                .run(self.api.validate_template(body))
                .await?
                .context("ValidateTemplate")?
                .into_iter()
                .filter(|p| p.default_value.is_none())
                .map(|p| p.key)
                .collect(),
        };

        for key in missing {
            if !request.has_parameter(&key) {
                debug!(stack = %request.stack_name, parameter = %key, "using previous value");
                request.parameters.push(Parameter::use_previous(key));
            }
        }
        Ok(())
    }

    /// Creates a change set for `request` and waits until it is reviewable.
    pub async fn prepare(
        &self,
        request: &DeploymentRequest,
        sink: &dyn StackEventSink,
    ) -> Result<PrepareOutcome> {
        validate_stack_name(&request.stack_name)?;
        self.ensure_stack_ready(&request.stack_name, sink).await?;

        let existing = self.describe(&request.stack_name).await?;
        let mut request = request.clone();
        if let (true, Some(stack)) = (request.populate_missing, existing.as_ref()) {
            self.populate_missing(&mut request, stack).await?;
        }

        let role_arn = match request.role.as_deref() {
            Some(role) => Some(self.expand_role(role).await?),
            None => None,
        };
        let mut tags = tags_from_env(&self.config.tag_env_prefix);
        tags.extend(request.tags.clone());

        let change_set_type = if existing.is_some() {
            ChangeSetType::Update
        } else {
            ChangeSetType::Create
        };
        let input = CreateChangeSetInput {
            change_set_name: format!("{}-csid-{}", request.stack_name, Utc::now().timestamp()),
            stack_name: request.stack_name.clone(),
            change_set_type,
            template: request.template.clone(),
            parameters: request.parameters.clone(),
            tags,
            notification_arns: request.notification_arns.clone(),
            capabilities: self.config.capabilities.clone(),
            role_arn,
            client_token: self.tokens.next_token(),
        };
        let handle = self
            .cancel
            .run(self.api.create_change_set(input))
            .await?
            .context("CreateChangeSet")?;
        info!(
            stack = %request.stack_name,
            change_set = %handle.change_set_id,
            change_set_type = ?change_set_type,
            "created change set"
        );

        let waiter = ChangeSetWaiter::new(self.api.as_ref(), &self.config, &self.cancel);
        let description = match waiter.wait(&handle.change_set_id).await {
            Ok(description) => description,
            Err(DeployError::NoOpChangeSet { change_set_id }) => {
                info!(stack = %request.stack_name, "no changes to deploy");
                self.cancel
                    .run(self.api.delete_change_set(&change_set_id))
                    .await?
                    .context("DeleteChangeSet")?;
                return Ok(PrepareOutcome::NoOp);
            }
            Err(err) => return Err(err),
        };

        let processed_template = self
            .cancel
            .run(self.api.get_template(&handle.change_set_id, TemplateStage::Processed))
            .await?
            .context("GetTemplate")?;

        Ok(PrepareOutcome::Ready(PreparedDeployment {
            stack_name: request.stack_name,
            stack_id: handle.stack_id,
            change_set_id: handle.change_set_id,
            change_set_type,
            changes: description.changes,
            processed_template,
        }))
    }

    /// Executes a change set and follows the stack to a terminal status.
    ///
    /// Returns the last event of the execution.
    pub async fn execute(
        &self,
        stack_id: &str,
        change_set_id: &str,
        sink: &dyn StackEventSink,
    ) -> Result<StackEvent> {
        let token = self.tokens.next_token();
        self.cancel
            .run(self.api.execute_change_set(change_set_id, &token))
            .await?
            .context("ExecuteChangeSet")?;
        info!(stack_id, change_set = change_set_id, token = %token, "executing change set");
        self.follow(stack_id, Some(&token), sink).await
    }

    /// Prepares and executes `request`.
    pub async fn up(&self, request: &DeploymentRequest, sink: &dyn StackEventSink) -> Result<UpOutcome> {
        let timer = OperationTimer::start("up");
        let prepared = match self.prepare(request, sink).await? {
            PrepareOutcome::Ready(prepared) => prepared,
            PrepareOutcome::NoOp => return Ok(UpOutcome::NoOp),
        };

        let final_event = self
            .execute(&prepared.stack_id, &prepared.change_set_id, sink)
            .await?;
        let stack = self.describe(&prepared.stack_id).await?;
        let status = stack
            .as_ref()
            .map_or_else(|| final_event.resource_status.clone(), |s| s.status.clone());
        if !status.is_successful() {
            warn!(
                stack = %prepared.stack_name,
                status = %status,
                elapsed_ms = timer.elapsed_ms(),
                "deployment failed"
            );
            return Ok(UpOutcome::Failed {
                stack_id: prepared.stack_id,
                status,
                final_event,
            });
        }

        if let Some(policy) = &request.stack_policy_body {
            self.cancel
                .run(self.api.set_stack_policy(&prepared.stack_id, policy))
                .await?
                .context("SetStackPolicy")?;
        }

        let outputs = stack.map(|s| s.output_map()).unwrap_or_default();
        info!(
            stack = %prepared.stack_name,
            status = %status,
            elapsed_ms = timer.elapsed_ms(),
            "deployment succeeded"
        );
        Ok(UpOutcome::Succeeded {
            stack_id: prepared.stack_id,
            status,
            outputs,
        })
    }

    /// Deletes a stack, retaining resources that refuse to delete.
    pub async fn down(&self, name: &str, sink: &dyn StackEventSink) -> Result<DownOutcome> {
        let Some(stack) = self.describe(name).await? else {
            debug!(stack = name, "stack does not exist");
            return Ok(DownOutcome::Absent);
        };

        let timer = OperationTimer::start("down");
        let final_event = self
            .delete_and_follow(&stack.stack_id, Vec::new(), sink)
            .await?;
        if final_event.resource_status != StackStatus::DeleteFailed {
            info!(stack = name, elapsed_ms = timer.elapsed_ms(), "stack deleted");
            return Ok(DownOutcome::Deleted {
                retained_resources: Vec::new(),
            });
        }

        let retained = self.resource_ids(&stack.stack_id, true).await?;
        warn!(stack = name, retained = ?retained, "retrying delete, retaining failed resources");
        let final_event = self
            .delete_and_follow(&stack.stack_id, retained.clone(), sink)
            .await?;
        if final_event.resource_status == StackStatus::DeleteFailed {
            warn!(
                stack = name,
                elapsed_ms = timer.elapsed_ms(),
                reason = final_event.resource_status_reason.as_deref().unwrap_or_default(),
                "stack failed to delete"
            );
            return Ok(DownOutcome::Failed {
                retained_resources: retained,
                final_event,
            });
        }
        info!(stack = name, elapsed_ms = timer.elapsed_ms(), "stack deleted");
        Ok(DownOutcome::Deleted {
            retained_resources: retained,
        })
    }

    /// Returns a stack's outputs; `None` if the stack does not exist.
    pub async fn outputs(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        Ok(self.describe(name).await?.map(|s| s.output_map()))
    }

    /// Follows the stack's most recent operation until it settles.
    ///
    /// Returns `None` if the stack does not exist.
    pub async fn tail(&self, name: &str, sink: &dyn StackEventSink) -> Result<Option<StackEvent>> {
        let Some(stack) = self.describe(name).await? else {
            return Ok(None);
        };
        self.follow(&stack.stack_id, None, sink).await.map(Some)
    }

    /// Returns `template` as the provider processes it, transforms applied.
    ///
    /// Uses a change set on a temporary stack, which is deleted afterwards.
    pub async fn transform(&self, template: &str, parameters: Vec<Parameter>) -> Result<String> {
        let now = Utc::now().timestamp();
        let stack_name = format!("{}-temp-{now}", self.config.token_prefix);
        let handle = self
            .cancel
            .run(self.api.create_change_set(CreateChangeSetInput {
                change_set_name: format!("csid-{now}"),
                stack_name: stack_name.clone(),
                change_set_type: ChangeSetType::Create,
                template: TemplateSource::Body(template.to_string()),
                parameters,
                tags: BTreeMap::new(),
                notification_arns: Vec::new(),
                capabilities: self.config.capabilities.clone(),
                role_arn: None,
                client_token: self.tokens.next_token(),
            }))
            .await?
            .context("CreateChangeSet")?;

        ChangeSetWaiter::new(self.api.as_ref(), &self.config, &self.cancel)
            .wait(&handle.change_set_id)
            .await?;
        let processed = self
            .cancel
            .run(self.api.get_template(&handle.change_set_id, TemplateStage::Processed))
            .await?
            .context("GetTemplate")?;

        self.cancel
            .run(self.api.delete_stack(DeleteStackInput {
                stack_name: handle.stack_id,
                client_token: self.tokens.next_token(),
                retain_resources: Vec::new(),
            }))
            .await?
            .context("DeleteStack")?;
        debug!(stack = %stack_name, "deleted temporary stack");
        Ok(processed)
    }

    async fn follow(
        &self,
        stack_id: &str,
        token: Option<&str>,
        sink: &dyn StackEventSink,
    ) -> Result<StackEvent> {
        let poller = EventPoller::new(self.api.as_ref(), &self.config, &self.cancel);
        match poller
            .poll_until_terminal(stack_id, token, |event| sink.deliver_event(event))
            .await
        {
            Ok(event) => Ok(event),
            Err(err) => {
                sink.deliver(TailEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn delete_and_follow(
        &self,
        stack_id: &str,
        retain_resources: Vec<String>,
        sink: &dyn StackEventSink,
    ) -> Result<StackEvent> {
        let token = self.tokens.next_token();
        self.cancel
            .run(self.api.delete_stack(DeleteStackInput {
                stack_name: stack_id.to_string(),
                client_token: token.clone(),
                retain_resources,
            }))
            .await?
            .context("DeleteStack")?;
        info!(stack_id, token = %token, "deleting stack");
        self.follow(stack_id, Some(&token), sink).await
    }

    /// Lists logical ids of the stack's resources, or only the
    /// `DELETE_FAILED` ones when `failed_only` is set.
    async fn resource_ids(&self, stack_id: &str, failed_only: bool) -> Result<Vec<String>> {
        let resources = with_throttle_retry(
            "ListStackResources",
            self.config.throttle_retry_interval(),
            &self.cancel,
            || self.api.list_stack_resources(stack_id),
        )
        .await?;
        Ok(resources
            .into_iter()
            .filter(|r| !failed_only || r.status == StackStatus::DeleteFailed)
            .map(|r| r.logical_resource_id)
            .collect())
    }

    async fn expand_role(&self, role: &str) -> Result<String> {
        if role.starts_with("arn:") {
            return Ok(role.to_string());
        }
        let identity = self
            .cancel
            .run(self.identity.caller_identity())
            .await?
            .context("GetCallerIdentity")?;
        Ok(format!("arn:aws:iam::{}:role/{role}", identity.account))
    }
}

impl std::fmt::Debug for StackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackOrchestrator")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn validate_stack_name(name: &str) -> Result<()> {
    let valid = match &*STACK_NAME {
        Ok(pattern) => pattern.is_match(name),
        Err(err) => return Err(DeployError::Validation(err.to_string())),
    };
    if valid {
        Ok(())
    } else {
        Err(DeployError::Validation(format!(
            "invalid stack name `{name}`: must start with a letter and contain only letters, digits and hyphens"
        )))
    }
}
