// =============================================================================
// task_store.rs — THE TASK REGISTRY
// =============================================================================
//
// Every submitted batch lives here while the background pipeline chews on
// it and the UI polls for progress. One writer per task (its own pipeline),
// any number of readers. Finished tasks are evicted after a retention
// window so the map doesn't grow for as long as the process lives.
// =============================================================================

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::TaskState;

pub type TaskId = Uuid;

#[derive(Debug, Clone)]
struct TaskRecord {
    state: TaskState,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// In-memory task registry, shared through an `Arc`.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh PENDING task and hand back its id.
    pub fn create(&self) -> TaskId {
        let id = Uuid::new_v4();
        let record = TaskRecord {
            state: TaskState::pending(),
            created_at: Utc::now(),
            finished_at: None,
        };
        self.tasks.write().insert(id, record);
        debug!(task_id = %id, "Task registered");
        id
    }

    /// Snapshot of a task's current state.
    pub fn get(&self, id: &TaskId) -> Option<TaskState> {
        self.tasks.read().get(id).map(|record| record.state.clone())
    }

    /// When the task was submitted.
    pub fn created_at(&self, id: &TaskId) -> Option<DateTime<Utc>> {
        self.tasks.read().get(id).map(|record| record.created_at)
    }

    /// Mutate a task in place under the write lock.
    ///
    /// Returns `false` when the task is unknown or already terminal; a
    /// COMPLETED or ERROR task is never touched again.
    pub fn update<F>(&self, id: &TaskId, mutate: F) -> bool
    where
        F: FnOnce(&mut TaskState),
    {
        let mut tasks = self.tasks.write();
        let Some(record) = tasks.get_mut(id) else {
            return false;
        };
        if record.state.status.is_terminal() {
            warn!(task_id = %id, status = %record.state.status, "Ignoring update to a finished task");
            return false;
        }

        mutate(&mut record.state);

        if record.state.status.is_terminal() {
            record.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Drop finished tasks whose completion is older than `retention`.
    ///
    /// Running and pending tasks are never evicted. Returns how many were removed.
    pub fn evict_finished(&self, retention: Duration) -> usize {
        self.evict_finished_at(retention, Utc::now())
    }

    fn evict_finished_at(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, record| match record.finished_at {
            Some(finished) => now.signed_duration_since(finished) < retention,
            None => true,
        });
        let evicted = before - tasks.len();
        if evicted > 0 {
            info!(evicted = evicted, remaining = tasks.len(), "Evicted finished tasks");
        }
        evicted
    }
}

/// Evict old finished tasks every `interval` until shutdown is signalled.
pub async fn run_janitor(
    store: Arc<TaskStore>,
    retention: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    // The first tick fires immediately; nothing to evict at startup.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                store.evict_finished(retention);
            }
            _ = shutdown.changed() => {
                debug!("Task janitor stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[test]
    fn test_create_starts_pending() {
        let store = TaskStore::new();
        let id = store.create();
        let state = store.get(&id).unwrap();
        assert_eq!(state.status, TaskStatus::Pending);
        assert_eq!(state.message, "Inicializando...");
        assert!(state.result.is_none());
        assert!(state.stats.is_none());
        assert!(state.errors.is_empty());
        assert!(store.created_at(&id).is_some());
    }

    #[test]
    fn test_unknown_task() {
        let store = TaskStore::new();
        assert!(store.get(&Uuid::new_v4()).is_none());
        assert!(!store.update(&Uuid::new_v4(), |s| s.message = "x".into()));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let store = TaskStore::new();
        let id = store.create();
        assert!(store.update(&id, |s| s.status = TaskStatus::Completed));
        assert!(!store.update(&id, |s| s.status = TaskStatus::Running));
        assert_eq!(store.get(&id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn test_eviction_only_touches_old_finished_tasks() {
        let store = TaskStore::new();
        let running = store.create();
        let finished = store.create();
        store.update(&running, |s| s.status = TaskStatus::Running);
        store.update(&finished, |s| s.status = TaskStatus::Error);

        let retention = Duration::from_secs(60);
        assert_eq!(store.evict_finished_at(retention, Utc::now()), 0);

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(store.evict_finished_at(retention, later), 1);
        assert!(store.get(&finished).is_none());
        assert!(store.get(&running).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_evicts_and_stops() {
        let store = Arc::new(TaskStore::new());
        let id = store.create();
        store.update(&id, |s| s.status = TaskStatus::Completed);

        let (tx, rx) = watch::channel(false);
        let janitor = tokio::spawn(run_janitor(store.clone(), Duration::ZERO, Duration::from_secs(60), rx));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.is_empty());

        tx.send(true).unwrap();
        janitor.await.unwrap();
    }
}
