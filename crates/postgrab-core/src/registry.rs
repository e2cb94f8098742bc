use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Point-in-time view of one registered unit.
#[derive(Clone, Debug)]
pub struct TaskInfo {
    pub id: TaskId,
    pub label: String,
    pub running_for: Duration,
    pub cancel_requested: bool,
}

struct TrackedTask {
    label: String,
    started: Instant,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RunningSet {
    next_id: u64,
    tasks: HashMap<TaskId, TrackedTask>,
}

/// Process-wide set of in-flight units of work.
///
/// [`TaskGuard`] deregisters from `Drop`; the lock is never held across an await.
#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<RunningSet>,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Track a new unit. It stays registered until the returned guard is dropped.
    pub fn register(self: &Arc<Self>, label: impl Into<String>) -> TaskGuard {
        let label = label.into();
        let cancel = CancellationToken::new();
        let id = {
            let mut set = self.lock();
            set.next_id += 1;
            let id = TaskId(set.next_id);
            set.tasks.insert(
                id,
                TrackedTask {
                    label: label.clone(),
                    started: Instant::now(),
                    cancel: cancel.clone(),
                },
            );
            id
        };
        tracing::debug!(task = id.0, %label, "task registered");
        TaskGuard {
            id,
            cancel,
            registry: Arc::clone(self),
        }
    }

    /// Remove `id`; false when it was not registered.
    pub fn deregister(&self, id: TaskId) -> bool {
        let removed = self.lock().tasks.remove(&id);
        if let Some(task) = &removed {
            tracing::debug!(
                task = id.0,
                label = %task.label,
                elapsed_ms = task.started.elapsed().as_millis() as u64,
                "task deregistered"
            );
        }
        removed.is_some()
    }

    /// Signal every registered unit and return how many were signalled.
    ///
    /// Units already asked to stop are counted again until they deregister.
    pub fn cancel_all(&self) -> usize {
        let set = self.lock();
        for task in set.tasks.values() {
            task.cancel.cancel();
        }
        let n = set.tasks.len();
        drop(set);
        tracing::info!(count = n, "cancelled running tasks");
        n
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<TaskInfo> {
        let set = self.lock();
        let mut out: Vec<TaskInfo> = set
            .tasks
            .iter()
            .map(|(id, t)| TaskInfo {
                id: *id,
                label: t.label.clone(),
                running_for: t.started.elapsed(),
                cancel_requested: t.cancel.is_cancelled(),
            })
            .collect();
        out.sort_by_key(|t| t.id);
        out
    }

    fn lock(&self) -> MutexGuard<'_, RunningSet> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration handle owned by the running unit.
pub struct TaskGuard {
    id: TaskId,
    cancel: CancellationToken,
    registry: Arc<TaskRegistry>,
}

impl TaskGuard {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_deregister_on_drop() {
        let reg = TaskRegistry::new();
        let a = reg.register("a");
        let b = reg.register("b");
        assert_eq!(reg.len(), 2);
        assert_ne!(a.id(), b.id());

        drop(a);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.snapshot()[0].label, "b");
        drop(b);
        assert!(reg.is_empty());
    }

    #[test]
    fn cancel_all_signals_every_registered_unit() {
        let reg = TaskRegistry::new();
        let a = reg.register("a");
        let b = reg.register("b");
        let token = a.token();

        assert_eq!(reg.cancel_all(), 2);
        assert!(token.is_cancelled());
        assert!(b.is_cancelled());
        assert!(reg.snapshot().iter().all(|t| t.cancel_requested));

        // Still registered until the units wind down.
        assert_eq!(reg.cancel_all(), 2);
        drop((a, b));
        assert_eq!(reg.cancel_all(), 0);
    }

    #[test]
    fn deregister_is_idempotent() {
        let reg = TaskRegistry::new();
        let guard = reg.register("x");
        let id = guard.id();
        assert!(reg.deregister(id));
        assert!(!reg.deregister(id));
        drop(guard);
        assert!(reg.is_empty());
    }
}
