//! Stack event poller.
//!
//! Events are listed newest-first. Each tick the poller walks pages until
//! it reaches an event it already delivered or one from a different
//! operation, then hands the new events to the callback oldest-first.

use std::collections::HashSet;
use tracing::{debug, trace};

use super::retry::with_throttle_retry;
use crate::api::ProvisioningApi;
use crate::cancellation::CancellationToken;
use crate::config::DeployConfig;
use crate::core::StackEvent;
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Correlation {
    Adopt,
    Match(Option<String>),
}

impl Correlation {
    fn accepts(&mut self, event: &StackEvent) -> bool {
        match self {
            Self::Adopt => {
                *self = Self::Match(event.client_request_token.clone());
                true
            }
            Self::Match(token) => *token == event.client_request_token,
        }
    }
}

/// Follows the events of one stack operation until the stack settles.
pub struct EventPoller<'a> {
    api: &'a dyn ProvisioningApi,
    config: &'a DeployConfig,
    cancel: &'a CancellationToken,
}

impl<'a> EventPoller<'a> {
    /// Creates a poller.
    #[must_use]
    pub fn new(
        api: &'a dyn ProvisioningApi,
        config: &'a DeployConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self { api, config, cancel }
    }

    /// Delivers events for `stack_id` until the stack reaches a terminal
    /// status or disappears, and returns the last event delivered.
    ///
    /// Only events carrying `token` are delivered. With `None`, the token
    /// of the newest event seen on the first non-empty listing is adopted.
    pub async fn poll_until_terminal<F>(
        &self,
        stack_id: &str,
        token: Option<&str>,
        mut on_event: F,
    ) -> Result<StackEvent>
    where
        F: FnMut(&StackEvent),
    {
        let mut correlation = token.map_or(Correlation::Adopt, |t| {
            Correlation::Match(Some(t.to_string()))
        });
        let mut delivered: HashSet<String> = HashSet::new();
        let mut last: Option<StackEvent> = None;
        let retry_interval = self.config.throttle_retry_interval();

        loop {
            self.cancel.sleep(self.config.event_poll_interval()).await?;

            let batch = self.collect_new(stack_id, &mut correlation, &delivered).await?;
            if batch.is_empty() {
                trace!(stack_id, "no new events");
                continue;
            }

            for event in batch.into_iter().rev() {
                delivered.insert(event.event_id.clone());
                on_event(&event);
                last = Some(event);
            }

            let stack = with_throttle_retry("DescribeStacks", retry_interval, self.cancel, || {
                self.api.describe_stack(stack_id)
            })
            .await?;
            if !stack.as_ref().map_or(true, |s| s.status.is_terminal()) {
                continue;
            }
            if let Some(event) = last.take() {
                debug!(
                    stack_id,
                    status = %event.resource_status,
                    events = delivered.len(),
                    "stack reached terminal status"
                );
                return Ok(event);
            }
        }
    }

    async fn collect_new(
        &self,
        stack_id: &str,
        correlation: &mut Correlation,
        delivered: &HashSet<String>,
    ) -> Result<Vec<StackEvent>> {
        let retry_interval = self.config.throttle_retry_interval();
        let mut batch = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = with_throttle_retry("DescribeStackEvents", retry_interval, self.cancel, || {
                self.api.describe_stack_events(stack_id, next_token.clone())
            })
            .await?;

            for event in page.events {
                if delivered.contains(&event.event_id) || !correlation.accepts(&event) {
                    return Ok(batch);
                }
                batch.push(event);
            }
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(batch),
            }
        }
    }
}

impl std::fmt::Debug for EventPoller<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPoller")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StackStatus;
    use crate::testing::FakeProvisioner;
    use std::sync::Arc;
    use std::time::Duration;

    const STACK: &str = "AWS::CloudFormation::Stack";

    fn config() -> DeployConfig {
        DeployConfig::new().with_all_intervals_ms(1)
    }

    #[tokio::test]
    async fn test_delivers_oldest_first_across_pages() {
        let fake = FakeProvisioner::new().with_page_size(2);
        let stack_id = fake.seed_stack("demo", StackStatus::UpdateInProgress, &[]);
        fake.push_stack_event("demo", StackStatus::UpdateInProgress, Some("tok"));
        fake.script_events(
            "demo",
            &[
                ("Queue", "AWS::SQS::Queue", StackStatus::UpdateInProgress),
                ("Queue", "AWS::SQS::Queue", StackStatus::UpdateComplete),
                ("demo", STACK, StackStatus::UpdateComplete),
            ],
            Some("tok"),
        );

        let config = config();
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        let last = EventPoller::new(&fake, &config, &cancel)
            .poll_until_terminal(&stack_id, Some("tok"), |e| {
                seen.push((e.logical_resource_id.clone(), e.resource_status.clone()));
            })
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![
                ("demo".to_string(), StackStatus::UpdateInProgress),
                ("Queue".to_string(), StackStatus::UpdateInProgress),
                ("Queue".to_string(), StackStatus::UpdateComplete),
                ("demo".to_string(), StackStatus::UpdateComplete),
            ]
        );
        assert_eq!(last.resource_status, StackStatus::UpdateComplete);
    }

    #[tokio::test]
    async fn test_stops_at_other_operations_events() {
        let fake = FakeProvisioner::new();
        let stack_id = fake.seed_stack("demo", StackStatus::CreateComplete, &[]);
        fake.push_stack_event("demo", StackStatus::CreateInProgress, Some("old"));
        fake.push_stack_event("demo", StackStatus::CreateComplete, Some("old"));
        fake.push_stack_event("demo", StackStatus::UpdateInProgress, Some("new"));
        fake.push_stack_event("demo", StackStatus::UpdateComplete, Some("new"));

        let config = config();
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        EventPoller::new(&fake, &config, &cancel)
            .poll_until_terminal(&stack_id, Some("new"), |e| seen.push(e.resource_status.clone()))
            .await
            .unwrap();

        assert_eq!(seen, vec![StackStatus::UpdateInProgress, StackStatus::UpdateComplete]);
    }

    #[tokio::test]
    async fn test_adopts_newest_token() {
        let fake = FakeProvisioner::new();
        let stack_id = fake.seed_stack("demo", StackStatus::UpdateComplete, &[]);
        fake.push_stack_event("demo", StackStatus::CreateComplete, Some("first"));
        fake.push_stack_event("demo", StackStatus::UpdateInProgress, Some("second"));
        fake.push_stack_event("demo", StackStatus::UpdateComplete, Some("second"));

        let config = config();
        let cancel = CancellationToken::new();
        let mut tokens = Vec::new();
        EventPoller::new(&fake, &config, &cancel)
            .poll_until_terminal(&stack_id, None, |e| tokens.push(e.client_request_token.clone()))
            .await
            .unwrap();

        assert_eq!(tokens, vec![Some("second".to_string()), Some("second".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_ticks_continue_until_events_arrive() {
        let fake = FakeProvisioner::new();
        let stack_id = fake.seed_stack("demo", StackStatus::DeleteInProgress, &[]);
        fake.script_events("demo", &[], Some("del"));
        fake.script_events(
            "demo",
            &[
                ("demo", STACK, StackStatus::DeleteInProgress),
                ("demo", STACK, StackStatus::DeleteComplete),
            ],
            Some("del"),
        );

        let config = config();
        let cancel = CancellationToken::new();
        let last = EventPoller::new(&fake, &config, &cancel)
            .poll_until_terminal(&stack_id, Some("del"), |_| {})
            .await
            .unwrap();

        assert_eq!(last.resource_status, StackStatus::DeleteComplete);
        assert!(fake.call_count("DescribeStackEvents") >= 2);
    }

    #[tokio::test]
    async fn test_throttled_listing_is_retried() {
        let fake = FakeProvisioner::new();
        let stack_id = fake.seed_stack("demo", StackStatus::CreateComplete, &[]);
        fake.push_stack_event("demo", StackStatus::CreateComplete, Some("tok"));
        fake.throttle("DescribeStackEvents", 3);

        let config = config();
        let cancel = CancellationToken::new();
        let last = EventPoller::new(&fake, &config, &cancel)
            .poll_until_terminal(&stack_id, Some("tok"), |_| {})
            .await
            .unwrap();

        assert_eq!(last.resource_status, StackStatus::CreateComplete);
        assert_eq!(fake.call_count("DescribeStackEvents"), 4);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_polling() {
        let fake = FakeProvisioner::new();
        let stack_id = fake.seed_stack("demo", StackStatus::UpdateInProgress, &[]);

        let config = config();
        let cancel = Arc::new(CancellationToken::new());
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel("interrupted");
        });

        let err = EventPoller::new(&fake, &config, &cancel)
            .poll_until_terminal(&stack_id, Some("tok"), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::DeployError::Cancelled(_)));
    }
}
