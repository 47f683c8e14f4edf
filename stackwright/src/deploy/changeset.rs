//! Change set waiter.

use tracing::{debug, warn};

use super::retry::with_throttle_retry;
use crate::api::{ChangeSetDescription, ProvisioningApi};
use crate::cancellation::CancellationToken;
use crate::config::DeployConfig;
use crate::core::ChangeSetStatus;
use crate::errors::{DeployError, Result};

/// Polls a change set until the provider has finished computing it.
pub struct ChangeSetWaiter<'a> {
    api: &'a dyn ProvisioningApi,
    config: &'a DeployConfig,
    cancel: &'a CancellationToken,
}

impl<'a> ChangeSetWaiter<'a> {
    /// Creates a waiter.
    #[must_use]
    pub fn new(
        api: &'a dyn ProvisioningApi,
        config: &'a DeployConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self { api, config, cancel }
    }

    /// Waits until the change set settles and returns its description.
    ///
    /// A change set that failed because it contained nothing to do yields
    /// [`DeployError::NoOpChangeSet`]; any other failure yields
    /// [`DeployError::ChangeSetFailed`] with the provider's reason.
    pub async fn wait(&self, change_set_id: &str) -> Result<ChangeSetDescription> {
        let interval = self.config.throttle_retry_interval();
        loop {
            let description = with_throttle_retry("DescribeChangeSet", interval, self.cancel, || {
                self.api.describe_change_set(change_set_id)
            })
            .await?;

            match description.status {
                ChangeSetStatus::CreateComplete => return Ok(description),
                ChangeSetStatus::Failed => {
                    let reason = description.status_reason.unwrap_or_default();
                    if self.config.is_no_change_reason(&reason) {
                        debug!(change_set_id, "change set contains no changes");
                        return Err(DeployError::NoOpChangeSet {
                            change_set_id: change_set_id.to_string(),
                        });
                    }
                    warn!(change_set_id, reason = %reason, "change set failed");
                    return Err(DeployError::ChangeSetFailed {
                        change_set_id: change_set_id.to_string(),
                        reason,
                    });
                }
                ChangeSetStatus::DeleteComplete => {
                    return Err(DeployError::ChangeSetFailed {
                        change_set_id: change_set_id.to_string(),
                        reason: "change set was deleted before it could be executed".to_string(),
                    });
                }
                ref status => {
                    debug!(change_set_id, status = %status, "waiting for change set");
                    self.cancel.sleep(self.config.change_set_poll_interval()).await?;
                }
            }
        }
    }
}

impl std::fmt::Debug for ChangeSetWaiter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSetWaiter")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockProvisioningApi;
    use crate::config::DEFAULT_NO_CHANGE_REASONS;
    use crate::errors::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn description(status: ChangeSetStatus, reason: Option<&str>) -> ChangeSetDescription {
        ChangeSetDescription {
            change_set_id: "cs-1".to_string(),
            stack_id: "stack-1".to_string(),
            status,
            status_reason: reason.map(ToString::to_string),
            changes: Vec::new(),
        }
    }

    fn config() -> DeployConfig {
        DeployConfig::new().with_all_intervals_ms(1)
    }

    #[tokio::test]
    async fn test_waits_until_complete() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let mut api = MockProvisioningApi::new();
        api.expect_describe_change_set().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(match n {
                0 => description(ChangeSetStatus::CreatePending, None),
                1 => description(ChangeSetStatus::CreateInProgress, None),
                _ => description(ChangeSetStatus::CreateComplete, None),
            })
        });

        let config = config();
        let cancel = CancellationToken::new();
        let result = ChangeSetWaiter::new(&api, &config, &cancel)
            .wait("cs-1")
            .await
            .unwrap();

        assert_eq!(result.status, ChangeSetStatus::CreateComplete);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_change_reasons_map_to_noop() {
        for reason in DEFAULT_NO_CHANGE_REASONS {
            let mut api = MockProvisioningApi::new();
            api.expect_describe_change_set()
                .returning(move |_| Ok(description(ChangeSetStatus::Failed, Some(reason))));

            let config = config();
            let cancel = CancellationToken::new();
            let err = ChangeSetWaiter::new(&api, &config, &cancel)
                .wait("cs-1")
                .await
                .unwrap_err();
            assert!(matches!(err, DeployError::NoOpChangeSet { .. }));
        }
    }

    #[tokio::test]
    async fn test_other_failure_carries_reason() {
        let mut api = MockProvisioningApi::new();
        api.expect_describe_change_set().returning(|_| {
            Ok(description(
                ChangeSetStatus::Failed,
                Some("Parameters: [Env] must have values"),
            ))
        });

        let config = config();
        let cancel = CancellationToken::new();
        let err = ChangeSetWaiter::new(&api, &config, &cancel)
            .wait("cs-1")
            .await
            .unwrap_err();
        match err {
            DeployError::ChangeSetFailed { reason, .. } => {
                assert_eq!(reason, "Parameters: [Env] must have values");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_custom_no_change_reason() {
        let mut api = MockProvisioningApi::new();
        api.expect_describe_change_set()
            .returning(|_| Ok(description(ChangeSetStatus::Failed, Some("Nothing to see here"))));

        let config = config().with_no_change_reason("Nothing to see here");
        let cancel = CancellationToken::new();
        let err = ChangeSetWaiter::new(&api, &config, &cancel)
            .wait("cs-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::NoOpChangeSet { .. }));
    }

    #[tokio::test]
    async fn test_throttled_describe_is_retried() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let mut api = MockProvisioningApi::new();
        api.expect_describe_change_set().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ApiError::throttled())
            } else {
                Ok(description(ChangeSetStatus::CreateComplete, None))
            }
        });

        let config = config();
        let cancel = CancellationToken::new();
        ChangeSetWaiter::new(&api, &config, &cancel)
            .wait("cs-1")
            .await
            .unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }
}
