//! In-memory task registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::domain::{PendingEvent, RescueError, Task, TaskId, TaskStatus, Transition};
use crate::observability::RegistryCounts;
use crate::ports::{EventFeed, TaskRegistry};

/// Arena of task records indexed by id.
///
/// Locking:
/// - the outer `RwLock` guards only the id -> slot map and is held briefly
///   (write only on insert)
/// - each task has its own `Mutex`; CAS on one id never waits on another
/// - the feed append happens while the task's mutex is held, so per-task feed
///   order equals version order
pub struct InMemoryTaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<Mutex<Task>>>>,
    feed: Arc<dyn EventFeed>,
}

impl InMemoryTaskRegistry {
    pub fn new(feed: Arc<dyn EventFeed>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            feed,
        }
    }

    async fn slot(&self, id: TaskId) -> Result<Arc<Mutex<Task>>, RescueError> {
        let tasks = self.tasks.read().await;
        tasks.get(&id).cloned().ok_or(RescueError::NotFound(id))
    }

    /// Snapshot of all slots; the map lock is released before any task lock.
    async fn slots(&self) -> Vec<Arc<Mutex<Task>>> {
        let tasks = self.tasks.read().await;
        tasks.values().cloned().collect()
    }

    async fn snapshot(&self) -> Vec<Task> {
        let mut out = Vec::new();
        for slot in self.slots().await {
            out.push(slot.lock().await.clone());
        }
        out.sort_by_key(|task| task.id());
        out
    }
}

#[async_trait]
impl TaskRegistry for InMemoryTaskRegistry {
    async fn insert(&self, task: Task) -> Result<(), RescueError> {
        let id = task.id();
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&id) {
            return Err(RescueError::DuplicateTask(id));
        }
        tasks.insert(id, Arc::new(Mutex::new(task)));
        trace!(task_id = %id, "task registered");
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Task, RescueError> {
        let slot = self.slot(id).await?;
        let task = slot.lock().await;
        Ok(task.clone())
    }

    async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        let mut tasks = self.snapshot().await;
        tasks.retain(|task| task.status() == status);
        tasks
    }

    async fn list_all(&self) -> Vec<Task> {
        self.snapshot().await
    }

    async fn compare_and_swap(
        &self,
        id: TaskId,
        expected_version: u64,
        transition: Transition,
    ) -> Result<Task, RescueError> {
        let slot = self.slot(id).await?;

        // No await past this point: once the lock is ours the transition and
        // its event are recorded together or not at all.
        let mut task = slot.lock().await;
        if let Err(err) = task.apply(expected_version, &transition) {
            debug!(
                task_id = %id,
                expected_version,
                error = %err,
                "compare-and-swap rejected"
            );
            return Err(err);
        }
        let event = self.feed.append(PendingEvent::accepted(&task, &transition));
        trace!(
            task_id = %id,
            version = task.version(),
            offset = event.offset,
            "compare-and-swap applied"
        );
        Ok(task.clone())
    }

    async fn counts(&self) -> RegistryCounts {
        let mut counts = RegistryCounts::default();
        for task in self.snapshot().await {
            counts.record(task.status());
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentId, Donation, DonationRequest, EventKind};
    use crate::impls::InMemoryEventFeed;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use ulid::Ulid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn task() -> Task {
        let request = DonationRequest::window_from(
            Donation::default(),
            now(),
            Duration::zero(),
            Duration::hours(1),
        );
        Task::post(TaskId::from_ulid(Ulid::new()), request, now()).unwrap()
    }

    fn registry() -> (InMemoryTaskRegistry, Arc<InMemoryEventFeed>) {
        let feed = Arc::new(InMemoryEventFeed::new(16));
        (InMemoryTaskRegistry::new(feed.clone()), feed)
    }

    fn claim(agent: AgentId) -> Transition {
        Transition::Claim { agent, at: now() }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let (registry, _) = registry();
        let task = task();
        registry.insert(task.clone()).await.unwrap();

        assert_eq!(registry.get(task.id()).await.unwrap(), task);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let (registry, _) = registry();
        let task = task();
        registry.insert(task.clone()).await.unwrap();

        let err = registry.insert(task.clone()).await.unwrap_err();
        assert_eq!(err, RescueError::DuplicateTask(task.id()));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (registry, _) = registry();
        let id = TaskId::from_ulid(Ulid::new());
        let agent = AgentId::from_ulid(Ulid::new());

        assert_eq!(registry.get(id).await.unwrap_err(), RescueError::NotFound(id));
        assert_eq!(
            registry.compare_and_swap(id, 1, claim(agent)).await.unwrap_err(),
            RescueError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn accepted_swap_bumps_version_and_records_event() {
        let (registry, feed) = registry();
        let task = task();
        registry.insert(task.clone()).await.unwrap();
        let agent = AgentId::from_ulid(Ulid::new());

        let updated = registry.compare_and_swap(task.id(), 1, claim(agent)).await.unwrap();

        assert_eq!(updated.version(), 2);
        assert_eq!(updated.status(), TaskStatus::Claimed);
        assert_eq!(feed.len(), 1);
        let event = feed.get(0).unwrap();
        assert_eq!(event.kind, EventKind::Claimed);
        assert_eq!(event.version, 2);
        assert_eq!(event.agent_id, agent);
    }

    #[tokio::test]
    async fn rejected_swap_records_nothing() {
        let (registry, feed) = registry();
        let task = task();
        registry.insert(task.clone()).await.unwrap();
        let agent = AgentId::from_ulid(Ulid::new());

        let err = registry.compare_and_swap(task.id(), 7, claim(agent)).await.unwrap_err();

        assert!(err.is_conflict());
        assert!(feed.is_empty());
        assert_eq!(registry.get(task.id()).await.unwrap(), task);
    }

    #[tokio::test]
    async fn list_available_only_returns_available_tasks() {
        let (registry, _) = registry();
        let open = task();
        let taken = task();
        registry.insert(open.clone()).await.unwrap();
        registry.insert(taken.clone()).await.unwrap();
        registry
            .compare_and_swap(taken.id(), 1, claim(AgentId::from_ulid(Ulid::new())))
            .await
            .unwrap();

        let available = registry.list_available().await;
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id(), open.id());

        let counts = registry.counts().await;
        assert_eq!(counts.available, 1);
        assert_eq!(counts.claimed, 1);
        assert_eq!(registry.list_all().await.len(), 2);
    }
}
