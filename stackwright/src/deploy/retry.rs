//! Retry of throttled remote calls.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::errors::{ApiError, ApiResultExt, Result};

/// Runs `call` until it returns something other than a throttling error.
///
/// Throttled attempts are retried after `interval` with no attempt limit.
/// Any other failure is returned as [`crate::errors::DeployError::Api`]
/// for `operation`. Cancellation interrupts both the call and the wait.
pub async fn with_throttle_retry<T, F, Fut>(
    operation: &str,
    interval: Duration,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match cancel.run(call()).await? {
            Err(err) if err.is_throttled() => {
                attempt += 1;
                debug!(operation, attempt, "throttled, retrying");
                cancel.sleep(interval).await?;
            }
            other => return other.context(operation),
        }
    }
}
