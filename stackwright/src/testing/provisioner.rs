//! In-memory provisioning provider.
//!
//! [`FakeProvisioner`] behaves like a small stack service: change sets are
//! computed from the template's `Resources`, executions and deletions emit
//! the event sequence a real provider would, and events come back
//! newest-first in pages. Failures, throttling and slow change sets can be
//! injected per test.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_yaml::Value;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::api::{
    ChangeSetDescription, ChangeSetHandle, CreateChangeSetInput, DeleteStackInput,
    ProvisioningApi, StackEventPage, TemplateStage,
};
use crate::config::DEFAULT_NO_CHANGE_REASONS;
use crate::core::{
    ChangeSetStatus, ChangeSetType, Parameter, ResourceChange, Stack, StackEvent, StackOutput,
    StackResourceSummary, StackStatus, TemplateParameter, TemplateSource,
};
use crate::errors::{ApiError, ApiErrorKind};

const ACCOUNT: &str = "123456789012";
const REGION: &str = "us-east-1";
const STACK_TYPE: &str = "AWS::CloudFormation::Stack";

#[derive(Debug, Clone)]
struct FakeResource {
    logical_id: String,
    resource_type: String,
    status: StackStatus,
}

#[derive(Debug)]
struct FakeStack {
    stack_id: String,
    name: String,
    status: StackStatus,
    template: Option<String>,
    parameters: Vec<Parameter>,
    resources: Vec<FakeResource>,
    outputs: Vec<StackOutput>,
    events: Vec<StackEvent>,
    policy: Option<String>,
    deleted: bool,
}

impl FakeStack {
    fn snapshot(&self) -> Stack {
        Stack {
            stack_id: self.stack_id.clone(),
            stack_name: self.name.clone(),
            status: self.status.clone(),
            status_reason: None,
            parameters: self.parameters.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

#[derive(Debug)]
struct FakeChangeSet {
    stack_id: String,
    change_set_type: ChangeSetType,
    status: ChangeSetStatus,
    reason: Option<String>,
    pending_polls: usize,
    changes: Vec<ResourceChange>,
    template: String,
    parameters: Vec<Parameter>,
    resources: Vec<(String, String)>,
}

#[derive(Debug)]
struct ScriptedBatch {
    stack_id: String,
    events: Vec<(String, String, StackStatus)>,
    token: Option<String>,
}

#[derive(Debug)]
struct State {
    stacks: Vec<FakeStack>,
    change_sets: HashMap<String, FakeChangeSet>,
    scripted: VecDeque<ScriptedBatch>,
    throttles: HashMap<String, usize>,
    failing_creates: HashSet<String>,
    failing_deletes: HashSet<String>,
    ignore_retain: bool,
    calls: Vec<String>,
    change_set_inputs: Vec<CreateChangeSetInput>,
    delete_inputs: Vec<DeleteStackInput>,
    pending_polls: usize,
    page_size: usize,
    sequence: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            stacks: Vec::new(),
            change_sets: HashMap::new(),
            scripted: VecDeque::new(),
            throttles: HashMap::new(),
            failing_creates: HashSet::new(),
            failing_deletes: HashSet::new(),
            ignore_retain: false,
            calls: Vec::new(),
            change_set_inputs: Vec::new(),
            delete_inputs: Vec::new(),
            pending_polls: 0,
            page_size: 100,
            sequence: 0,
        }
    }
}

impl State {
    fn record(&mut self, operation: &str) -> Result<(), ApiError> {
        self.calls.push(operation.to_string());
        match self.throttles.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ApiError::throttled())
            }
            _ => Ok(()),
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Names match live stacks only; ids also match deleted ones.
    fn find(&self, name_or_id: &str) -> Option<usize> {
        if name_or_id.starts_with("arn:") {
            self.stacks.iter().position(|s| s.stack_id == name_or_id)
        } else {
            self.stacks
                .iter()
                .position(|s| s.name == name_or_id && !s.deleted)
        }
    }

    fn find_or_missing(&self, name_or_id: &str) -> Result<usize, ApiError> {
        self.find(name_or_id)
            .ok_or_else(|| ApiError::validation(format!("Stack with id {name_or_id} does not exist")))
    }

    fn new_stack(&mut self, name: &str, status: StackStatus) -> usize {
        let sequence = self.next_sequence();
        self.stacks.push(FakeStack {
            stack_id: format!("arn:aws:cloudformation:{REGION}:{ACCOUNT}:stack/{name}/{sequence}"),
            name: name.to_string(),
            status,
            template: None,
            parameters: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
            events: Vec::new(),
            policy: None,
            deleted: false,
        });
        self.stacks.len() - 1
    }

    fn emit(
        &mut self,
        idx: usize,
        logical_id: &str,
        resource_type: &str,
        status: StackStatus,
        reason: Option<&str>,
        token: Option<&str>,
    ) {
        let sequence = self.next_sequence();
        let stack = &mut self.stacks[idx];
        let physical_id = if resource_type == STACK_TYPE {
            stack.stack_id.clone()
        } else {
            format!("{}-{logical_id}", stack.name)
        };
        let offset = chrono::Duration::seconds(i64::try_from(sequence).unwrap_or(i64::MAX));
        stack.events.push(StackEvent {
            event_id: format!("event-{sequence:06}"),
            stack_id: stack.stack_id.clone(),
            stack_name: stack.name.clone(),
            logical_resource_id: logical_id.to_string(),
            physical_resource_id: Some(physical_id),
            resource_type: resource_type.to_string(),
            resource_status: status,
            resource_status_reason: reason.map(ToString::to_string),
            client_request_token: token.map(ToString::to_string),
            timestamp: epoch() + offset,
        });
    }

    fn emit_stack(&mut self, idx: usize, status: StackStatus, reason: Option<&str>, token: Option<&str>) {
        let name = self.stacks[idx].name.clone();
        self.stacks[idx].status = status.clone();
        self.emit(idx, &name, STACK_TYPE, status, reason, token);
    }

    fn release_scripted(&mut self, idx: usize) {
        let stack_id = self.stacks[idx].stack_id.clone();
        let Some(pos) = self.scripted.iter().position(|b| b.stack_id == stack_id) else {
            return;
        };
        let Some(batch) = self.scripted.remove(pos) else {
            return;
        };
        for (logical_id, resource_type, status) in batch.events {
            if resource_type == STACK_TYPE {
                self.stacks[idx].status = status.clone();
                if status == StackStatus::DeleteComplete {
                    self.stacks[idx].deleted = true;
                }
            }
            self.emit(idx, &logical_id, &resource_type, status, None, batch.token.as_deref());
        }
    }

    fn execute(&mut self, change_set: FakeChangeSet, token: &str) -> Result<(), ApiError> {
        let idx = self.find_or_missing(&change_set.stack_id)?;
        let creating = change_set.change_set_type == ChangeSetType::Create;
        let (in_progress, complete, rolling_back, rolled_back) = if creating {
            (
                StackStatus::CreateInProgress,
                StackStatus::CreateComplete,
                StackStatus::RollbackInProgress,
                StackStatus::RollbackComplete,
            )
        } else {
            (
                StackStatus::UpdateInProgress,
                StackStatus::UpdateComplete,
                StackStatus::UpdateRollbackInProgress,
                StackStatus::UpdateRollbackComplete,
            )
        };
        let token = Some(token);

        self.emit_stack(idx, in_progress, Some("User Initiated"), token);
        let mut failed = None;
        for change in &change_set.changes {
            let (started, finished) = match change.action.as_str() {
                "Add" => (StackStatus::CreateInProgress, StackStatus::CreateComplete),
                "Remove" => (StackStatus::DeleteInProgress, StackStatus::DeleteComplete),
                _ => (StackStatus::UpdateInProgress, StackStatus::UpdateComplete),
            };
            let logical_id = &change.logical_resource_id;
            self.emit(idx, logical_id, &change.resource_type, started, None, token);
            if change.action == "Add" && self.failing_creates.contains(logical_id) {
                self.emit(
                    idx,
                    logical_id,
                    &change.resource_type,
                    StackStatus::CreateFailed,
                    Some("Resource handler returned message: \"Invalid request\""),
                    token,
                );
                failed = Some(logical_id.clone());
                break;
            }
            self.emit(idx, logical_id, &change.resource_type, finished, None, token);
        }

        if let Some(logical_id) = failed {
            let reason = format!("The following resource(s) failed to create: [{logical_id}]. ");
            self.emit_stack(idx, rolling_back, Some(&reason), token);
            self.emit_stack(idx, rolled_back, None, token);
            if creating {
                self.stacks[idx].resources.clear();
            }
            return Ok(());
        }

        self.emit_stack(idx, complete.clone(), None, token);
        let stack = &mut self.stacks[idx];
        stack.outputs = template_outputs(&change_set.template, &stack.name);
        stack.template = Some(change_set.template);
        stack.parameters = change_set.parameters;
        stack.resources = change_set
            .resources
            .into_iter()
            .map(|(logical_id, resource_type)| FakeResource {
                logical_id,
                resource_type,
                status: complete.clone(),
            })
            .collect();
        Ok(())
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn parse_template(body: &str) -> Result<Value, ApiError> {
    serde_yaml::from_str(body).map_err(|e| ApiError::validation(format!("Template format error: {e}")))
}

fn template_resources(body: &str) -> Result<Vec<(String, String)>, ApiError> {
    let template = parse_template(body)?;
    let resources = template
        .get("Resources")
        .and_then(Value::as_mapping)
        .ok_or_else(|| {
            ApiError::validation("Template format error: At least one Resources member must be defined.")
        })?;
    resources
        .iter()
        .map(|(name, resource)| -> Result<(String, String), ApiError> {
            let name = name.as_str().unwrap_or_default().to_string();
            let resource_type = resource
                .get("Type")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ApiError::validation(format!("Template format error: [/Resources/{name}] Type is required"))
                })?;
            Ok((name, resource_type.to_string()))
        })
        .collect()
}

fn template_outputs(body: &str, stack_name: &str) -> Vec<StackOutput> {
    let Ok(template) = parse_template(body) else {
        return Vec::new();
    };
    let Some(outputs) = template.get("Outputs").and_then(Value::as_mapping) else {
        return Vec::new();
    };
    outputs
        .iter()
        .filter_map(|(key, output)| {
            let key = key.as_str()?.to_string();
            let value = match output.get("Value")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Tagged(tagged) if tagged.tag.to_string().trim_start_matches('!') == "Ref" => {
                    format!("{stack_name}-{}", tagged.value.as_str().unwrap_or_default())
                }
                _ => format!("{stack_name}-{key}"),
            };
            Some(StackOutput {
                key,
                value,
                description: output
                    .get("Description")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            })
        })
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn processed_template(body: &str) -> String {
    match parse_template(body) {
        Ok(Value::Mapping(mut mapping)) if mapping.contains_key("Transform") => {
            mapping.remove("Transform");
            serde_yaml::to_string(&mapping).unwrap_or_else(|_| body.to_string())
        }
        _ => body.to_string(),
    }
}

fn sorted(mut parameters: Vec<Parameter>) -> Vec<Parameter> {
    parameters.sort_by(|a, b| a.key.cmp(&b.key));
    parameters
}

/// An in-memory [`ProvisioningApi`].
#[derive(Debug, Default)]
pub struct FakeProvisioner {
    state: Mutex<State>,
}

impl FakeProvisioner {
    /// Creates a provider with no stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many events each page holds.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.state.get_mut().page_size = page_size.max(1);
        self
    }

    /// Keeps new change sets in `CREATE_IN_PROGRESS` for `polls` describes.
    #[must_use]
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.state.get_mut().pending_polls = polls;
        self
    }

    /// Makes the next `times` calls to `operation` fail with throttling.
    pub fn throttle(&self, operation: &str, times: usize) {
        self.state.lock().throttles.insert(operation.to_string(), times);
    }

    /// Makes creation of resource `logical_id` fail.
    pub fn fail_create_of(&self, logical_id: &str) {
        self.state.lock().failing_creates.insert(logical_id.to_string());
    }

    /// Makes deletion of resource `logical_id` fail unless it is retained.
    pub fn fail_delete_of(&self, logical_id: &str) {
        self.state.lock().failing_deletes.insert(logical_id.to_string());
    }

    /// Makes deletes ignore the retain list and attempt every resource.
    pub fn ignore_retain(&self) {
        self.state.lock().ignore_retain = true;
    }

    /// Adds a stack in `status` owning `resources` and returns its id.
    pub fn seed_stack(&self, name: &str, status: StackStatus, resources: &[(&str, &str)]) -> String {
        let mut state = self.state.lock();
        let idx = state.new_stack(name, status);
        let stack = &mut state.stacks[idx];
        stack.resources = resources
            .iter()
            .map(|(logical_id, resource_type)| FakeResource {
                logical_id: (*logical_id).to_string(),
                resource_type: (*resource_type).to_string(),
                status: StackStatus::CreateComplete,
            })
            .collect();
        stack.stack_id.clone()
    }

    /// Sets the template and parameters of an existing stack.
    pub fn set_stack_template(&self, name: &str, body: &str, parameters: Vec<Parameter>) {
        let mut state = self.state.lock();
        if let Some(idx) = state.find(name) {
            let stack = &mut state.stacks[idx];
            stack.template = Some(body.to_string());
            stack.parameters = sorted(parameters);
        }
    }

    /// Records a stack-level event and moves the stack to `status`.
    pub fn push_stack_event(&self, name: &str, status: StackStatus, token: Option<&str>) {
        let mut state = self.state.lock();
        if let Some(idx) = state.find(name) {
            state.emit_stack(idx, status, None, token);
        }
    }

    /// Queues events that appear on the next first-page event listing.
    ///
    /// Each entry is `(logical id, resource type, status)`; entries of type
    /// `AWS::CloudFormation::Stack` also move the stack to that status.
    pub fn script_events(&self, name: &str, events: &[(&str, &str, StackStatus)], token: Option<&str>) {
        let mut state = self.state.lock();
        let Some(idx) = state.find(name) else {
            return;
        };
        let stack_id = state.stacks[idx].stack_id.clone();
        state.scripted.push_back(ScriptedBatch {
            stack_id,
            events: events
                .iter()
                .map(|(l, t, s)| ((*l).to_string(), (*t).to_string(), s.clone()))
                .collect(),
            token: token.map(ToString::to_string),
        });
    }

    /// Returns the live stack named `name`.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<Stack> {
        let state = self.state.lock();
        state.find(name).map(|idx| state.stacks[idx].snapshot())
    }

    /// Returns every event of a stack, oldest first.
    #[must_use]
    pub fn events(&self, name_or_id: &str) -> Vec<StackEvent> {
        let state = self.state.lock();
        state
            .find(name_or_id)
            .map(|idx| state.stacks[idx].events.clone())
            .unwrap_or_default()
    }

    /// Returns the stack policy set on a stack.
    #[must_use]
    pub fn stack_policy(&self, name_or_id: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .find(name_or_id)
            .and_then(|idx| state.stacks[idx].policy.clone())
    }

    /// Returns the number of change sets that are neither executed nor deleted.
    #[must_use]
    pub fn change_set_count(&self) -> usize {
        self.state.lock().change_sets.len()
    }

    /// Returns every change set request received.
    #[must_use]
    pub fn change_set_inputs(&self) -> Vec<CreateChangeSetInput> {
        self.state.lock().change_set_inputs.clone()
    }

    /// Returns every delete request received.
    #[must_use]
    pub fn delete_inputs(&self) -> Vec<DeleteStackInput> {
        self.state.lock().delete_inputs.clone()
    }

    /// Returns the names of every operation called, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Returns how many times `operation` was called.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }
}

#[async_trait]
impl ProvisioningApi for FakeProvisioner {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<Stack>, ApiError> {
        let mut state = self.state.lock();
        state.record("DescribeStacks")?;
        Ok(state.find(stack_name).map(|idx| state.stacks[idx].snapshot()))
    }

    async fn create_change_set(&self, input: CreateChangeSetInput) -> Result<ChangeSetHandle, ApiError> {
        let mut state = self.state.lock();
        state.record("CreateChangeSet")?;
        state.change_set_inputs.push(input.clone());

        let name = &input.stack_name;
        let idx = match (input.change_set_type, state.find(name)) {
            (ChangeSetType::Create, Some(idx)) => {
                if state.stacks[idx].status != StackStatus::ReviewInProgress {
                    return Err(ApiError::new(
                        ApiErrorKind::AlreadyExists,
                        "AlreadyExistsException",
                        format!("Stack [{name}] already exists"),
                    ));
                }
                idx
            }
            (ChangeSetType::Create, None) => {
                let idx = state.new_stack(name, StackStatus::ReviewInProgress);
                state.emit_stack(idx, StackStatus::ReviewInProgress, Some("User Initiated"), None);
                idx
            }
            (ChangeSetType::Update, None) => {
                return Err(ApiError::validation(format!("Stack [{name}] does not exist")));
            }
            (ChangeSetType::Update, Some(idx)) => idx,
        };

        let stack = &state.stacks[idx];
        let body = match &input.template {
            TemplateSource::Body(body) => body.clone(),
            TemplateSource::UsePrevious => stack.template.clone().ok_or_else(|| {
                ApiError::validation(format!("Stack [{name}] has no previous template"))
            })?,
        };
        let resources = template_resources(&body)?;

        let mut parameters = Vec::with_capacity(input.parameters.len());
        for parameter in &input.parameters {
            if parameter.use_previous_value {
                let previous = stack
                    .parameters
                    .iter()
                    .find(|p| p.key == parameter.key)
                    .and_then(|p| p.value.clone())
                    .ok_or_else(|| {
                        ApiError::validation(format!(
                            "Invalid input for parameter key {}. Cannot specify usePreviousValue as true for a parameter key not in the previous template",
                            parameter.key
                        ))
                    })?;
                parameters.push(Parameter::new(&parameter.key, previous));
            } else {
                parameters.push(parameter.clone());
            }
        }
        let parameters = sorted(parameters);

        let unchanged = input.change_set_type == ChangeSetType::Update
            && stack.template.as_deref() == Some(body.as_str())
            && stack.parameters == parameters;

        let mut changes = Vec::new();
        if !unchanged {
            for (logical_id, resource_type) in &resources {
                let existing = stack.resources.iter().find(|r| &r.logical_id == logical_id);
                changes.push(ResourceChange {
                    action: if existing.is_some() { "Modify" } else { "Add" }.to_string(),
                    logical_resource_id: logical_id.clone(),
                    physical_resource_id: existing.map(|r| format!("{}-{}", stack.name, r.logical_id)),
                    resource_type: resource_type.clone(),
                    replacement: existing.map(|_| "False".to_string()),
                });
            }
            for resource in &stack.resources {
                if !resources.iter().any(|(l, _)| l == &resource.logical_id) {
                    changes.push(ResourceChange {
                        action: "Remove".to_string(),
                        logical_resource_id: resource.logical_id.clone(),
                        physical_resource_id: Some(format!("{}-{}", stack.name, resource.logical_id)),
                        resource_type: resource.resource_type.clone(),
                        replacement: None,
                    });
                }
            }
        }

        let stack_id = stack.stack_id.clone();
        let sequence = state.next_sequence();
        let change_set_id = format!(
            "arn:aws:cloudformation:{REGION}:{ACCOUNT}:changeSet/{}/{sequence}",
            input.change_set_name
        );
        let (status, reason) = if unchanged {
            (ChangeSetStatus::Failed, Some(DEFAULT_NO_CHANGE_REASONS[0].to_string()))
        } else {
            (ChangeSetStatus::CreateComplete, None)
        };
        let pending_polls = state.pending_polls;
        state.change_sets.insert(
            change_set_id.clone(),
            FakeChangeSet {
                stack_id: stack_id.clone(),
                change_set_type: input.change_set_type,
                status,
                reason,
                pending_polls,
                changes,
                template: body,
                parameters,
                resources,
            },
        );

        Ok(ChangeSetHandle {
            change_set_id,
            stack_id,
        })
    }

    async fn describe_change_set(&self, change_set_id: &str) -> Result<ChangeSetDescription, ApiError> {
        let mut state = self.state.lock();
        state.record("DescribeChangeSet")?;
        let change_set = state.change_sets.get_mut(change_set_id).ok_or_else(|| {
            ApiError::not_found(format!("ChangeSet [{change_set_id}] does not exist"))
        })?;

        let (status, reason) = if change_set.pending_polls > 0 {
            change_set.pending_polls -= 1;
            (ChangeSetStatus::CreateInProgress, None)
        } else {
            (change_set.status.clone(), change_set.reason.clone())
        };
        Ok(ChangeSetDescription {
            change_set_id: change_set_id.to_string(),
            stack_id: change_set.stack_id.clone(),
            status,
            status_reason: reason,
            changes: change_set.changes.clone(),
        })
    }

    async fn execute_change_set(&self, change_set_id: &str, client_token: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record("ExecuteChangeSet")?;
        let ready = state
            .change_sets
            .get(change_set_id)
            .ok_or_else(|| ApiError::not_found(format!("ChangeSet [{change_set_id}] does not exist")))?
            .status
            == ChangeSetStatus::CreateComplete;
        if !ready {
            return Err(ApiError::new(
                ApiErrorKind::Validation,
                "InvalidChangeSetStatus",
                format!("ChangeSet [{change_set_id}] cannot be executed in its current status"),
            ));
        }
        let Some(change_set) = state.change_sets.remove(change_set_id) else {
            return Ok(());
        };
        state.execute(change_set, client_token)
    }

    async fn delete_change_set(&self, change_set_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record("DeleteChangeSet")?;
        state
            .change_sets
            .remove(change_set_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("ChangeSet [{change_set_id}] does not exist")))
    }

    async fn get_template(&self, change_set_id: &str, stage: TemplateStage) -> Result<String, ApiError> {
        let mut state = self.state.lock();
        state.record("GetTemplate")?;
        let change_set = state.change_sets.get(change_set_id).ok_or_else(|| {
            ApiError::not_found(format!("ChangeSet [{change_set_id}] does not exist"))
        })?;
        Ok(match stage {
            TemplateStage::Original => change_set.template.clone(),
            TemplateStage::Processed => processed_template(&change_set.template),
        })
    }

    async fn delete_stack(&self, input: DeleteStackInput) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record("DeleteStack")?;
        state.delete_inputs.push(input.clone());
        let Some(idx) = state.find(&input.stack_name) else {
            return Ok(());
        };

        let token = Some(input.client_token.as_str());
        state.emit_stack(idx, StackStatus::DeleteInProgress, Some("User Initiated"), token);

        let resources = state.stacks[idx].resources.clone();
        let mut remaining = Vec::new();
        for resource in resources.iter().rev() {
            let (logical_id, resource_type) = (&resource.logical_id, &resource.resource_type);
            if !state.ignore_retain && input.retain_resources.contains(logical_id) {
                state.emit(idx, logical_id, resource_type, StackStatus::DeleteSkipped, None, token);
                continue;
            }
            state.emit(idx, logical_id, resource_type, StackStatus::DeleteInProgress, None, token);
            if state.failing_deletes.contains(logical_id) {
                state.emit(
                    idx,
                    logical_id,
                    resource_type,
                    StackStatus::DeleteFailed,
                    Some("Resource is not in a deletable state"),
                    token,
                );
                remaining.push(FakeResource {
                    status: StackStatus::DeleteFailed,
                    ..resource.clone()
                });
            } else {
                state.emit(idx, logical_id, resource_type, StackStatus::DeleteComplete, None, token);
            }
        }

        if remaining.is_empty() {
            state.emit_stack(idx, StackStatus::DeleteComplete, None, token);
            let stack = &mut state.stacks[idx];
            stack.resources.clear();
            stack.deleted = true;
        } else {
            remaining.reverse();
            let names: Vec<_> = remaining.iter().map(|r| r.logical_id.as_str()).collect();
            let reason = format!("The following resource(s) failed to delete: [{}]. ", names.join(", "));
            state.emit_stack(idx, StackStatus::DeleteFailed, Some(&reason), token);
            state.stacks[idx].resources = remaining;
        }
        Ok(())
    }

    async fn describe_stack_events(
        &self,
        stack_id: &str,
        next_token: Option<String>,
    ) -> Result<StackEventPage, ApiError> {
        let mut state = self.state.lock();
        state.record("DescribeStackEvents")?;
        let idx = state.find_or_missing(stack_id)?;
        if next_token.is_none() {
            state.release_scripted(idx);
        }

        let offset = next_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let events = &state.stacks[idx].events;
        let page: Vec<_> = events
            .iter()
            .rev()
            .skip(offset)
            .take(state.page_size)
            .cloned()
            .collect();
        let consumed = offset + page.len();
        Ok(StackEventPage {
            next_token: (consumed < events.len()).then(|| consumed.to_string()),
            events: page,
        })
    }

    async fn list_stack_resources(&self, stack_id: &str) -> Result<Vec<StackResourceSummary>, ApiError> {
        let mut state = self.state.lock();
        state.record("ListStackResources")?;
        let idx = state.find_or_missing(stack_id)?;
        Ok(state.stacks[idx]
            .resources
            .iter()
            .map(|r| StackResourceSummary {
                logical_resource_id: r.logical_id.clone(),
                resource_type: r.resource_type.clone(),
                status: r.status.clone(),
            })
            .collect())
    }

    async fn validate_template(&self, template_body: &str) -> Result<Vec<TemplateParameter>, ApiError> {
        let mut state = self.state.lock();
        state.record("ValidateTemplate")?;
        let template = parse_template(template_body)?;
        let Some(parameters) = template.get("Parameters").and_then(Value::as_mapping) else {
            return Ok(Vec::new());
        };
        Ok(parameters
            .iter()
            .filter_map(|(key, declaration)| {
                Some(TemplateParameter {
                    key: key.as_str()?.to_string(),
                    default_value: declaration.get("Default").and_then(scalar_string),
                })
            })
            .collect())
    }

    async fn set_stack_policy(&self, stack_id: &str, policy_body: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record("SetStackPolicy")?;
        let idx = state.find_or_missing(stack_id)?;
        state.stacks[idx].policy = Some(policy_body.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
Resources:
  Queue:
    Type: AWS::SQS::Queue
  Topic:
    Type: AWS::SNS::Topic
Outputs:
  TopicName:
    Value: !Ref Topic
";

    fn create_input(name: &str, change_set_type: ChangeSetType, template: TemplateSource) -> CreateChangeSetInput {
        CreateChangeSetInput {
            change_set_name: format!("{name}-csid-1"),
            stack_name: name.to_string(),
            change_set_type,
            template,
            parameters: Vec::new(),
            tags: std::collections::BTreeMap::new(),
            notification_arns: Vec::new(),
            capabilities: Vec::new(),
            role_arn: None,
            client_token: "cs-token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_execute_emits_events() {
        let fake = FakeProvisioner::new();
        let handle = fake
            .create_change_set(create_input(
                "demo",
                ChangeSetType::Create,
                TemplateSource::Body(TEMPLATE.to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(fake.stack("demo").unwrap().status, StackStatus::ReviewInProgress);

        fake.execute_change_set(&handle.change_set_id, "exec-1").await.unwrap();

        let stack = fake.stack("demo").unwrap();
        assert_eq!(stack.status, StackStatus::CreateComplete);
        assert_eq!(stack.output_map().get("TopicName").map(String::as_str), Some("demo-Topic"));

        let events = fake.events("demo");
        assert_eq!(events.len(), 7);
        assert!(events[0].client_request_token.is_none());
        assert!(events[1..]
            .iter()
            .all(|e| e.client_request_token.as_deref() == Some("exec-1")));
    }

    #[tokio::test]
    async fn test_identical_update_has_no_changes() {
        let fake = FakeProvisioner::new();
        fake.seed_stack("demo", StackStatus::CreateComplete, &[("Queue", "AWS::SQS::Queue")]);
        fake.set_stack_template("demo", TEMPLATE, Vec::new());

        let handle = fake
            .create_change_set(create_input("demo", ChangeSetType::Update, TemplateSource::UsePrevious))
            .await
            .unwrap();
        let description = fake.describe_change_set(&handle.change_set_id).await.unwrap();

        assert_eq!(description.status, ChangeSetStatus::Failed);
        assert_eq!(description.status_reason.as_deref(), Some(DEFAULT_NO_CHANGE_REASONS[0]));
    }

    #[tokio::test]
    async fn test_events_paginate_newest_first() {
        let fake = FakeProvisioner::new().with_page_size(2);
        fake.seed_stack("demo", StackStatus::CreateComplete, &[]);
        for _ in 0..3 {
            fake.push_stack_event("demo", StackStatus::UpdateInProgress, None);
        }

        let first = fake.describe_stack_events("demo", None).await.unwrap();
        assert_eq!(first.events.len(), 2);
        assert_eq!(first.events[0].event_id, "event-000004");
        let second = fake
            .describe_stack_events("demo", first.next_token)
            .await
            .unwrap();
        assert_eq!(second.events.len(), 1);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_throttle_injection() {
        let fake = FakeProvisioner::new();
        fake.throttle("DescribeStacks", 1);

        assert!(fake.describe_stack("demo").await.unwrap_err().is_throttled());
        assert!(fake.describe_stack("demo").await.unwrap().is_none());
        assert_eq!(fake.call_count("DescribeStacks"), 2);
    }

    #[tokio::test]
    async fn test_deleted_stack_visible_by_id_only() {
        let fake = FakeProvisioner::new();
        let stack_id = fake.seed_stack("demo", StackStatus::CreateComplete, &[]);
        fake.delete_stack(DeleteStackInput {
            stack_name: "demo".to_string(),
            client_token: "del-1".to_string(),
            retain_resources: Vec::new(),
        })
        .await
        .unwrap();

        assert!(fake.describe_stack("demo").await.unwrap().is_none());
        let by_id = fake.describe_stack(&stack_id).await.unwrap().unwrap();
        assert_eq!(by_id.status, StackStatus::DeleteComplete);
    }

    #[tokio::test]
    async fn test_validate_template_reports_defaults() {
        let fake = FakeProvisioner::new();
        let template = "\
Parameters:
  Env:
    Type: String
  Size:
    Type: Number
    Default: 3
Resources:
  Queue:
    Type: AWS::SQS::Queue
";
        let parameters = fake.validate_template(template).await.unwrap();
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[0].default_value, None);
        assert_eq!(parameters[1].default_value.as_deref(), Some("3"));
    }
}
