//! Cancellable task registry.
//!
//! Long upstream calls are registered under a correlation id so that a later
//! stop request, or the caller noticing its client went away, can cancel
//! them. Cancellation drops the operation future inside its spawned task,
//! which releases whatever connection it held.
//!
//! Every registration is removed from the registry exactly once, by the
//! spawned task itself after the operation has terminated (normally, by
//! cancellation or by panic). A [`TaskHandle`] dropped without being awaited
//! cancels the operation.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxgate_core::{CoreError, StopStatus};

/// Recently finished ids remembered for `stop`.
const FINISHED_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("A task is already running for id '{0}'")]
    AlreadyRegistered(String),

    /// Stopped through [`TaskRegistry::stop`] before it finished.
    #[error("Task was cancelled")]
    Cancelled,

    /// The caller's client went away first.
    #[error("Client disconnected")]
    ClientDisconnected,

    /// The operation panicked.
    #[error("Task failed: {0}")]
    Failed(String),
}

impl From<TaskError> for CoreError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::AlreadyRegistered(id) => {
                Self::validation(format!("request id '{id}' is already in flight"))
            }
            TaskError::Cancelled | TaskError::ClientDisconnected => Self::ClientDisconnected,
            TaskError::Failed(msg) => Self::Internal(msg),
        }
    }
}

#[derive(Debug)]
struct LiveTask {
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
    generation: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    live: HashMap<String, LiveTask>,
    finished: VecDeque<String>,
    next_generation: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    state: Mutex<RegistryState>,
}

impl RegistryInner {
    fn state(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the record for `id` if it still belongs to `generation`.
    fn remove(&self, id: &str, generation: u64) {
        let mut state = self.state();
        let owned = state
            .live
            .get(id)
            .is_some_and(|task| task.generation == generation);
        if !owned {
            return;
        }
        state.live.remove(id);
        if state.finished.len() >= FINISHED_CAPACITY {
            state.finished.pop_front();
        }
        state.finished.push_back(id.to_string());
        debug!(request_id = id, "Task removed");
    }
}

/// Removes a registration when the spawned task ends, unwinding included.
struct RemoveOnDrop {
    registry: Arc<RegistryInner>,
    id: String,
    generation: u64,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        self.registry.remove(&self.id, self.generation);
    }
}

/// Registry of in-flight tasks keyed by correlation id.
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
    poll_interval: Duration,
}

impl TaskRegistry {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner::default()),
            poll_interval,
        }
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Spawn `operation` under `id`.
    ///
    /// Fails if a task for `id` is still live.
    pub fn register<T, F>(&self, id: &str, operation: F) -> Result<TaskHandle<T>, TaskError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));

        let generation = {
            let mut state = self.inner.state();
            if state.live.contains_key(id) {
                return Err(TaskError::AlreadyRegistered(id.to_string()));
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.finished.retain(|finished| finished != id);
            state.live.insert(
                id.to_string(),
                LiveTask {
                    cancel: cancel.clone(),
                    done: Arc::clone(&done),
                    generation,
                },
            );
            generation
        };

        let token = cancel.clone();
        let cleanup = RemoveOnDrop {
            registry: Arc::clone(&self.inner),
            id: id.to_string(),
            generation,
        };
        let join = tokio::spawn(async move {
            let _cleanup = cleanup;
            let output = tokio::select! {
                biased;
                () = token.cancelled() => None,
                output = operation => Some(output),
            };
            done.store(true, Ordering::Release);
            output
        });

        debug!(request_id = id, generation, "Task registered");
        Ok(TaskHandle {
            id: id.to_string(),
            cancel,
            join: Some(join),
        })
    }

    /// Await `handle` while polling `is_client_gone` every poll interval.
    ///
    /// If the client goes first the operation is cancelled and awaited, and
    /// the result is [`TaskError::ClientDisconnected`] even when the
    /// operation would have succeeded.
    pub async fn await_with_disconnect<T, G>(
        &self,
        mut handle: TaskHandle<T>,
        mut is_client_gone: G,
    ) -> Result<T, TaskError>
    where
        T: Send + 'static,
        G: FnMut() -> bool,
    {
        let Some(join) = handle.join.as_mut() else {
            return Err(TaskError::Failed("task handle already consumed".to_string()));
        };

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let finished = loop {
            tokio::select! {
                biased;
                result = &mut *join => break Some(result),
                _ = ticker.tick() => {
                    if is_client_gone() {
                        break None;
                    }
                }
            }
        };

        let outcome = match finished {
            Some(Ok(Some(output))) => Ok(output),
            Some(Ok(None)) => {
                info!(request_id = %handle.id, "Task stopped before completion");
                Err(TaskError::Cancelled)
            }
            Some(Err(join_err)) => {
                warn!(request_id = %handle.id, error = %join_err, "Task terminated abnormally");
                if join_err.is_panic() {
                    Err(TaskError::Failed(join_err.to_string()))
                } else {
                    Err(TaskError::Cancelled)
                }
            }
            None => {
                info!(request_id = %handle.id, "Client disconnected, cancelling task");
                handle.cancel.cancel();
                // Wait for the operation to observe cancellation before reporting.
                let _ = (&mut *join).await;
                Err(TaskError::ClientDisconnected)
            }
        };

        handle.join = None;
        outcome
    }

    /// Ask the task registered under `id` to stop.
    pub fn stop(&self, id: &str) -> StopStatus {
        let state = self.inner.state();
        let status = match state.live.get(id) {
            Some(task) if task.done.load(Ordering::Acquire) => StopStatus::AlreadyDone,
            Some(task) => {
                task.cancel.cancel();
                StopStatus::Cancelling
            }
            None if state.finished.iter().any(|finished| finished == id) => {
                StopStatus::AlreadyDone
            }
            None => StopStatus::NotFound,
        };
        drop(state);
        info!(request_id = id, status = status.as_str(), "Stop requested");
        status
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.state().live.contains_key(id)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.inner.state().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to one registered task.
///
/// Dropping it without awaiting cancels the task; the registry record goes
/// away once the operation has terminated.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: String,
    cancel: CancellationToken,
    join: Option<JoinHandle<Option<T>>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancel the operation without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> TaskRegistry {
        TaskRegistry::new(Duration::from_millis(200))
    }

    /// Sets a flag when dropped, to observe that an operation was torn down.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_returns_result_and_removes() {
        let registry = registry();
        let handle = registry
            .register("a", async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                42
            })
            .unwrap();
        assert!(registry.contains("a"));

        let result = registry.await_with_disconnect(handle, || false).await;
        assert_eq!(result, Ok(42));
        assert!(registry.is_empty());
        assert_eq!(registry.stop("a"), StopStatus::AlreadyDone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_live_id_rejected() {
        let registry = registry();
        let _first = registry
            .register("dup", std::future::pending::<()>())
            .unwrap();
        let second = registry.register("dup", async {});
        assert!(matches!(second, Err(TaskError::AlreadyRegistered(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_statuses() {
        let registry = registry();
        assert_eq!(registry.stop("unknown"), StopStatus::NotFound);

        let handle = registry
            .register("s", std::future::pending::<()>())
            .unwrap();
        assert_eq!(registry.stop("s"), StopStatus::Cancelling);

        let result = registry.await_with_disconnect(handle, || false).await;
        assert_eq!(result, Err(TaskError::Cancelled));
        assert!(!registry.contains("s"));
        assert_eq!(registry.stop("s"), StopStatus::AlreadyDone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_gone_wins_over_later_success() {
        let registry = registry();
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&torn_down));
        let handle = registry
            .register("c", async move {
                let _flag = flag;
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late result"
            })
            .unwrap();

        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let result = registry
            .await_with_disconnect(handle, move || counter.fetch_add(1, Ordering::SeqCst) >= 2)
            .await;

        assert_eq!(result, Err(TaskError::ClientDisconnected));
        assert!(torn_down.load(Ordering::SeqCst));
        assert!(!registry.contains("c"));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_cancels_and_cleans_up() {
        let registry = registry();
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&torn_down));
        let handle = registry
            .register("d", async move {
                let _flag = flag;
                std::future::pending::<()>().await;
            })
            .unwrap();

        drop(handle);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(torn_down.load(Ordering::SeqCst));
        assert!(!registry.contains("d"));
        assert_eq!(registry.stop("d"), StopStatus::AlreadyDone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_removal_does_not_touch_new_registration() {
        let registry = registry();
        let first = registry.register("r", async { 1 }).unwrap();
        assert_eq!(registry.await_with_disconnect(first, || false).await, Ok(1));

        let second = registry
            .register("r", std::future::pending::<i32>())
            .unwrap();
        // A removal for the old generation must not evict the live one.
        registry.inner.remove("r", 0);
        assert!(registry.contains("r"));
        assert_eq!(registry.stop("r"), StopStatus::Cancelling);
        drop(second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_ring_is_bounded() {
        let registry = registry();
        for i in 0..(FINISHED_CAPACITY + 10) {
            let handle = registry.register(&format!("t{i}"), async {}).unwrap();
            registry.await_with_disconnect(handle, || false).await.unwrap();
        }
        assert_eq!(registry.stop("t0"), StopStatus::NotFound);
        assert_eq!(
            registry.stop(&format!("t{}", FINISHED_CAPACITY + 9)),
            StopStatus::AlreadyDone
        );
    }
}
