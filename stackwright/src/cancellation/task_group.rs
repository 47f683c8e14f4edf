//! Slot-indexed task group for fan-out work.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::CancellationToken;

/// A group of tasks where each task owns exactly one result slot.
///
/// Results are gathered by [`SlotTaskGroup::join`] in spawn order. If any
/// task fails, the group's token is cancelled, the remaining tasks are
/// aborted and the first error is returned.
pub struct SlotTaskGroup<T, E> {
    cancel_token: Arc<CancellationToken>,
    handles: Vec<JoinHandle<Result<T, E>>>,
}

impl<T, E> SlotTaskGroup<T, E>
where
    T: Send + 'static,
    E: From<tokio::task::JoinError> + Send + 'static,
{
    /// Creates a task group sharing `cancel_token` with its tasks.
    #[must_use]
    pub fn new(cancel_token: Arc<CancellationToken>) -> Self {
        Self {
            cancel_token,
            handles: Vec::new(),
        }
    }

    /// Returns the cancellation token handed to each task.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel_token
    }

    /// Spawns a task and returns the slot its result will occupy.
    pub fn spawn<F, Fut>(&mut self, task: F) -> usize
    where
        F: FnOnce(Arc<CancellationToken>) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let slot = self.handles.len();
        self.handles.push(tokio::spawn(task(self.cancel_token.clone())));
        slot
    }

    /// Returns the number of spawned tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no task was spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every task and returns the results in slot order.
    pub async fn join(self) -> Result<Vec<T>, E> {
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
            .take(self.handles.len())
            .collect();
        let aborts: Vec<_> = self.handles.iter().map(JoinHandle::abort_handle).collect();

        let mut pending: FuturesUnordered<_> = self
            .handles
            .into_iter()
            .enumerate()
            .map(|(slot, handle)| async move { (slot, handle.await) })
            .collect();

        while let Some((slot, joined)) = pending.next().await {
            let outcome = joined.map_err(E::from).and_then(|result| result);
            match outcome {
                Ok(value) => slots[slot] = Some(value),
                Err(err) => {
                    debug!(slot, "task failed, aborting remaining tasks");
                    self.cancel_token.cancel(format!("task in slot {slot} failed"));
                    for abort in &aborts {
                        abort.abort();
                    }
                    return Err(err);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

impl<T, E> std::fmt::Debug for SlotTaskGroup<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTaskGroup")
            .field("task_count", &self.handles.len())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}
