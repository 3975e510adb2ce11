//! Bounded background task processor.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::ProcessorError;
use super::registry::{RegistrationGuard, TaskRegistry};
use super::types::{Task, TaskId, TaskStatus, TaskType};

/// Executes tasks of one [`TaskType`].
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Runs `task`. Implementations must watch `cx` and return promptly once
    /// it is cancelled.
    async fn handle(&self, task: &Task, cx: &CancellationToken) -> Result<(), ProcessorError>;
}

type HandlerMap = DashMap<TaskType, Arc<dyn TaskHandler>>;

struct QueuedTask {
    task: Task,
    generation: u64,
    token: CancellationToken,
}

/// In-memory, best-effort executor.
///
/// Submissions go into a fixed-capacity queue and fail immediately with
/// [`ProcessorError::QueueFull`] when it has no free slot. A single
/// dispatcher drains the queue and spawns one execution per task, bound to a
/// cancellation token that also fires when the task's timeout elapses.
/// [`Self::shutdown`] cancels everything outstanding and waits for the
/// executions to finish.
pub struct BackgroundProcessor {
    sender: mpsc::Sender<QueuedTask>,
    receiver: Mutex<Option<mpsc::Receiver<QueuedTask>>>,
    registry: Arc<TaskRegistry>,
    handlers: Arc<HandlerMap>,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundProcessor {
    /// Default queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

    /// Creates a stopped processor whose queue holds `queue_capacity` tasks.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            registry: Arc::new(TaskRegistry::new()),
            handlers: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
            dispatcher: Mutex::new(None),
        }
    }

    /// Registers the handler for `task_type`, replacing any previous one.
    pub fn register_handler(&self, task_type: TaskType, handler: Arc<dyn TaskHandler>) {
        debug!(task_type = %task_type, "registering task handler");
        self.handlers.insert(task_type, handler);
    }

    /// Spawns the dispatcher loop.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` on a second call and `ShuttingDown` after
    /// [`Self::shutdown`].
    pub fn start(&self) -> Result<(), ProcessorError> {
        if self.shutdown.is_cancelled() {
            return Err(ProcessorError::ShuttingDown);
        }
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| ProcessorError::AlreadyStarted)?
            .take()
            .ok_or(ProcessorError::AlreadyStarted)?;

        let handle = tokio::spawn(dispatch(
            receiver,
            Arc::clone(&self.registry),
            Arc::clone(&self.handlers),
            self.shutdown.clone(),
        ));
        if let Ok(mut slot) = self.dispatcher.lock() {
            *slot = Some(handle);
        }
        info!(capacity = self.sender.max_capacity(), "background processor started");
        Ok(())
    }

    /// Enqueues `task` without waiting.
    ///
    /// # Errors
    ///
    /// - `QueueFull` if the queue has no free slot
    /// - `DuplicateTask` if a task with the same id is outstanding
    /// - `ShuttingDown` after [`Self::shutdown`]
    pub fn submit_task(&self, task: Task) -> Result<(), ProcessorError> {
        if self.shutdown.is_cancelled() {
            return Err(ProcessorError::ShuttingDown);
        }

        let token = self.shutdown.child_token();
        let generation = self.registry.register(&task.id, token.clone())?;
        let id = task.id.clone();
        let queued = QueuedTask {
            task,
            generation,
            token,
        };

        match self.sender.try_send(queued) {
            Ok(()) => {
                debug!(task_id = %id, "task queued");
                Ok(())
            }
            Err(err) => {
                self.registry.release(&id, generation);
                match err {
                    TrySendError::Full(_) => {
                        warn!(task_id = %id, "task queue full, rejecting task");
                        Err(ProcessorError::QueueFull)
                    }
                    TrySendError::Closed(_) => Err(ProcessorError::ShuttingDown),
                }
            }
        }
    }

    /// Signals cancellation to task `id`, queued or running.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if the task never existed or already finished.
    pub fn cancel_task(&self, id: &TaskId) -> Result<(), ProcessorError> {
        self.registry.cancel(id)?;
        info!(task_id = %id, "task cancellation requested");
        Ok(())
    }

    /// Best-effort status of `id`; `None` if it is not tracked. For
    /// observability only.
    #[must_use]
    pub fn get_task_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.registry.status(id)
    }

    /// Number of queued and running tasks.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.registry.len()
    }

    /// Cancels every outstanding task, stops the dispatcher and waits for all
    /// executions to return. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.dispatcher.lock().ok().and_then(|mut slot| slot.take());
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!(error = %e, "dispatcher terminated abnormally");
                }
            }
            None => {
                // Never started: drop whatever was queued.
                let receiver = self.receiver.lock().ok().and_then(|mut slot| slot.take());
                if let Some(receiver) = receiver {
                    drain(receiver, &self.registry);
                }
            }
        }
        self.registry.cancel_all();
        info!("background processor stopped");
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<QueuedTask>,
    registry: Arc<TaskRegistry>,
    handlers: Arc<HandlerMap>,
    shutdown: CancellationToken,
) {
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            Some(joined) = running.join_next(), if !running.is_empty() => log_join(joined),
            next = receiver.recv() => match next {
                Some(queued) => spawn_execution(&mut running, queued, &registry, &handlers),
                None => break,
            },
        }
    }

    drain(receiver, &registry);
    debug!(running = running.len(), "waiting for running tasks");
    while let Some(joined) = running.join_next().await {
        log_join(joined);
    }
}

fn drain(mut receiver: mpsc::Receiver<QueuedTask>, registry: &TaskRegistry) {
    receiver.close();
    while let Ok(queued) = receiver.try_recv() {
        queued.token.cancel();
        registry.release(&queued.task.id, queued.generation);
        debug!(task_id = %queued.task.id, "dropping queued task on shutdown");
    }
}

fn spawn_execution(
    running: &mut JoinSet<()>,
    queued: QueuedTask,
    registry: &Arc<TaskRegistry>,
    handlers: &HandlerMap,
) {
    let QueuedTask {
        task,
        generation,
        token,
    } = queued;

    let Some(handler) = handlers
        .get(&task.task_type)
        .map(|entry| Arc::clone(entry.value()))
    else {
        warn!(task_id = %task.id, task_type = %task.task_type, "no handler registered, discarding task");
        registry.release(&task.id, generation);
        return;
    };

    if token.is_cancelled() || !registry.mark_started(&task.id, generation) {
        debug!(task_id = %task.id, "task canceled before start");
        registry.release(&task.id, generation);
        return;
    }

    let guard = RegistrationGuard::new(Arc::clone(registry), task.id.clone(), generation);
    running.spawn(async move {
        let _guard = guard;
        let started = Instant::now();
        info!(task_id = %task.id, task_type = %task.task_type, "task started");

        let result = run_with_timeout(handler.as_ref(), &task, &token).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(()) => info!(task_id = %task.id, duration_ms, "task finished"),
            Err(e) => error!(task_id = %task.id, duration_ms, error = %e, "task failed"),
        }
    });
}

/// Runs the handler; when the deadline passes first the token is fired and
/// the handler is awaited so it can record its own outcome.
async fn run_with_timeout(
    handler: &dyn TaskHandler,
    task: &Task,
    token: &CancellationToken,
) -> Result<(), ProcessorError> {
    let work = handler.handle(task, token);
    tokio::pin!(work);

    tokio::select! {
        res = &mut work => res,
        () = tokio::time::sleep(task.timeout) => {
            warn!(task_id = %task.id, timeout_secs = task.timeout.as_secs(), "task deadline exceeded");
            token.cancel();
            work.await
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "task execution panicked");
        } else {
            debug!(error = %e, "task execution aborted");
        }
    }
}
