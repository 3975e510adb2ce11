//! Cancellation registry for outstanding tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;

use super::error::ProcessorError;
use super::types::{TaskId, TaskStatus};

struct TaskEntry {
    generation: u64,
    token: CancellationToken,
    started: AtomicBool,
}

/// Maps task ids to the cancellation handle of their execution.
///
/// An entry is created when a task is accepted and removed when its
/// execution ends or it is canceled. Each entry carries a generation number
/// so a finishing execution never removes the entry of a newer task that
/// reuses the same id.
#[derive(Default)]
pub struct TaskRegistry {
    entries: DashMap<TaskId, TaskEntry>,
    next_generation: AtomicU64,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` with `token`, returning the entry generation.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTask` if `id` is already registered.
    pub fn register(&self, id: &TaskId, token: CancellationToken) -> Result<u64, ProcessorError> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => Err(ProcessorError::DuplicateTask(id.clone())),
            Entry::Vacant(slot) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                slot.insert(TaskEntry {
                    generation,
                    token,
                    started: AtomicBool::new(false),
                });
                Ok(generation)
            }
        }
    }

    /// Marks the entry as running. Returns false if it was canceled or
    /// replaced in the meantime.
    pub fn mark_started(&self, id: &TaskId, generation: u64) -> bool {
        match self.entries.get(id) {
            Some(entry) if entry.generation == generation => {
                entry.started.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Removes `id` and fires its token.
    ///
    /// Removal and lookup are one atomic step, so concurrent cancels of the
    /// same id fire the token once and all but one report `TaskNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `id` is not registered.
    pub fn cancel(&self, id: &TaskId) -> Result<(), ProcessorError> {
        let (_, entry) = self
            .entries
            .remove(id)
            .ok_or_else(|| ProcessorError::TaskNotFound(id.clone()))?;
        entry.token.cancel();
        Ok(())
    }

    /// Removes the entry for `id` only if it still belongs to `generation`.
    pub fn release(&self, id: &TaskId, generation: u64) {
        self.entries
            .remove_if(id, |_, entry| entry.generation == generation);
    }

    /// Cancels and removes every entry, returning how many were fired.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<TaskId> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.cancel(id).is_ok()).count()
    }

    /// Best-effort status of `id`; `None` once it is no longer tracked.
    #[must_use]
    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.entries.get(id).map(|entry| {
            if entry.started.load(Ordering::Acquire) {
                TaskStatus::Running
            } else {
                TaskStatus::Pending
            }
        })
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Releases a registry entry when dropped, including during a panic unwind.
pub(crate) struct RegistrationGuard {
    registry: Arc<TaskRegistry>,
    id: TaskId,
    generation: u64,
}

impl RegistrationGuard {
    pub(crate) fn new(registry: Arc<TaskRegistry>, id: TaskId, generation: u64) -> Self {
        Self {
            registry,
            id,
            generation,
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.generation);
    }
}
