//! Configuration types for deployments and packaging.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Status reasons the provider reports for a change set with nothing to do.
pub const DEFAULT_NO_CHANGE_REASONS: [&str; 2] = [
    "The submitted information didn't contain changes. Submit different information to create a change set.",
    "No updates are to be performed.",
];

/// Configuration for the stack orchestrator, event poller and change set waiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Interval between stack event polls, in milliseconds.
    #[serde(default = "default_event_poll_interval")]
    pub event_poll_interval_ms: u64,
    /// Interval between change set status polls, in milliseconds.
    #[serde(default = "default_change_set_poll_interval")]
    pub change_set_poll_interval_ms: u64,
    /// Delay before retrying a throttled call, in milliseconds.
    #[serde(default = "default_throttle_retry_interval")]
    pub throttle_retry_interval_ms: u64,
    /// Change set failure reasons that mean "nothing to change".
    #[serde(default = "default_no_change_reasons")]
    pub no_change_reasons: Vec<String>,
    /// Capabilities acknowledged on every change set.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
    /// Environment variable prefix for extra stack tags.
    #[serde(default = "default_tag_env_prefix")]
    pub tag_env_prefix: String,
    /// Prefix of generated correlation tokens.
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,
}

fn default_event_poll_interval() -> u64 {
    3000
}

fn default_change_set_poll_interval() -> u64 {
    2000
}

fn default_throttle_retry_interval() -> u64 {
    1000
}

fn default_no_change_reasons() -> Vec<String> {
    DEFAULT_NO_CHANGE_REASONS
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_capabilities() -> Vec<String> {
    vec![
        "CAPABILITY_IAM".to_string(),
        "CAPABILITY_NAMED_IAM".to_string(),
    ]
}

fn default_tag_env_prefix() -> String {
    "CFN_TAG_".to_string()
}

fn default_token_prefix() -> String {
    "stackwright".to_string()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: default_event_poll_interval(),
            change_set_poll_interval_ms: default_change_set_poll_interval(),
            throttle_retry_interval_ms: default_throttle_retry_interval(),
            no_change_reasons: default_no_change_reasons(),
            capabilities: default_capabilities(),
            tag_env_prefix: default_tag_env_prefix(),
            token_prefix: default_token_prefix(),
        }
    }
}

impl DeployConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets every poll and retry interval to `ms` milliseconds.
    #[must_use]
    pub fn with_all_intervals_ms(mut self, ms: u64) -> Self {
        self.event_poll_interval_ms = ms;
        self.change_set_poll_interval_ms = ms;
        self.throttle_retry_interval_ms = ms;
        self
    }

    /// Sets the stack event poll interval.
    #[must_use]
    pub fn with_event_poll_interval_ms(mut self, ms: u64) -> Self {
        self.event_poll_interval_ms = ms;
        self
    }

    /// Sets the change set poll interval.
    #[must_use]
    pub fn with_change_set_poll_interval_ms(mut self, ms: u64) -> Self {
        self.change_set_poll_interval_ms = ms;
        self
    }

    /// Adds a reason to the "no changes" allow-list.
    #[must_use]
    pub fn with_no_change_reason(mut self, reason: impl Into<String>) -> Self {
        self.no_change_reasons.push(reason.into());
        self
    }

    /// Replaces the acknowledged capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the tag environment prefix.
    #[must_use]
    pub fn with_tag_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_env_prefix = prefix.into();
        self
    }

    /// Gets the event poll interval as Duration.
    #[must_use]
    pub const fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    /// Gets the change set poll interval as Duration.
    #[must_use]
    pub const fn change_set_poll_interval(&self) -> Duration {
        Duration::from_millis(self.change_set_poll_interval_ms)
    }

    /// Gets the throttle retry interval as Duration.
    #[must_use]
    pub const fn throttle_retry_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_retry_interval_ms)
    }

    /// Returns true if `reason` means the change set had nothing to do.
    #[must_use]
    pub fn is_no_change_reason(&self, reason: &str) -> bool {
        self.no_change_reasons.iter().any(|r| r == reason)
    }
}

/// Configuration for the artifact packager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagerConfig {
    /// First component of the artifact bucket name.
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
    /// Optional last component of the artifact bucket name.
    #[serde(default)]
    pub bucket_suffix: Option<String>,
    /// Tags applied to a newly created bucket.
    #[serde(default)]
    pub bucket_tags: BTreeMap<String, String>,
    /// Region the bucket lives in.
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_bucket_prefix() -> String {
    "stackwright".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            bucket_prefix: default_bucket_prefix(),
            bucket_suffix: None,
            bucket_tags: BTreeMap::new(),
            region: default_region(),
        }
    }
}

impl PackagerConfig {
    /// Creates a new configuration for `region`.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Sets the bucket suffix.
    #[must_use]
    pub fn with_bucket_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.bucket_suffix = Some(suffix.into());
        self
    }

    /// Adds a bucket tag.
    #[must_use]
    pub fn with_bucket_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bucket_tags.insert(key.into(), value.into());
        self
    }

    /// Returns the bucket name for `account`.
    #[must_use]
    pub fn bucket_name(&self, account: &str) -> String {
        let mut name = format!("{}-{}-{}", self.bucket_prefix, self.region, account);
        if let Some(suffix) = self.bucket_suffix.as_deref().filter(|s| !s.is_empty()) {
            name.push('-');
            name.push_str(suffix);
        }
        name
    }
}

/// Collects stack tags from environment variables starting with `prefix`.
///
/// `CFN_TAG_team=infra` yields the tag `team = infra`.
pub fn tags_from_env(prefix: &str) -> BTreeMap<String, String> {
    tags_from_vars(prefix, std::env::vars())
}

fn tags_from_vars(
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    if prefix.is_empty() {
        return BTreeMap::new();
    }
    vars.into_iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(prefix)
                .filter(|key| !key.is_empty())
                .map(|key| (key.to_string(), value))
        })
        .collect()
}
