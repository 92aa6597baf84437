//! ClaimCoordinator - タスク獲得の調停
//!
//! # 処理フロー
//! get → expiry → tracker slot → CAS(Claim) → commit slot
//!
//! The tracker slot is taken before the CAS and held by a `SlotGuard`, so an
//! agent can never end up with two claims even when it races itself. If the
//! CAS fails, or the future is dropped while waiting on the task lock, the
//! guard gives the slot back.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{AgentId, RescueError, Task, TaskId, Transition};
use crate::ports::{AssignmentTracker, Clock, SlotGuard, TaskRegistry};

#[derive(Clone)]
pub struct ClaimCoordinator {
    registry: Arc<dyn TaskRegistry>,
    tracker: Arc<dyn AssignmentTracker>,
    clock: Arc<dyn Clock>,
}

impl ClaimCoordinator {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        tracker: Arc<dyn AssignmentTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            tracker,
            clock,
        }
    }

    /// Claim `task_id` for `agent`, provided it is still at `expected_version`.
    ///
    /// # Errors
    /// - `NotFound`: no such task
    /// - `ExpiredTask`: the pickup window closed, whatever the stored status
    /// - `ActiveTaskExists`: the agent already holds a task
    /// - `VersionConflict`: someone else got there first, refetch and retry
    pub async fn claim(
        &self,
        agent: AgentId,
        task_id: TaskId,
        expected_version: u64,
    ) -> Result<Task, RescueError> {
        let task = self.registry.get(task_id).await?;
        let now = self.clock.now();
        if task.is_expired_at(now) {
            debug!(task_id = %task_id, agent_id = %agent, "claim refused: pickup window closed");
            return Err(RescueError::ExpiredTask {
                task_id,
                pickup_end: task.pickup_end(),
            });
        }

        let guard = SlotGuard::acquire(self.tracker.as_ref(), agent, task_id)?;

        let transition = Transition::Claim { agent, at: now };
        match self
            .registry
            .compare_and_swap(task_id, expected_version, transition)
            .await
        {
            Ok(claimed) => {
                guard.commit();
                info!(
                    task_id = %task_id,
                    agent_id = %agent,
                    version = claimed.version(),
                    "task claimed"
                );
                Ok(claimed)
            }
            Err(err) => {
                drop(guard);
                debug!(
                    task_id = %task_id,
                    agent_id = %agent,
                    expected_version,
                    error = %err,
                    "claim lost"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Donation, DonationRequest, TaskStatus};
    use crate::impls::{InMemoryAssignmentTracker, InMemoryEventFeed, InMemoryTaskRegistry};
        use crate::observability::RegistryCounts;
    use crate::ports::{EventFeed, FixedClock};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use ulid::Ulid;

    struct Fixture {
        coordinator: ClaimCoordinator,
        registry: Arc<InMemoryTaskRegistry>,
        tracker: Arc<InMemoryAssignmentTracker>,
        feed: Arc<InMemoryEventFeed>,
        clock: Arc<FixedClock>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let feed = Arc::new(InMemoryEventFeed::new(16));
        let registry = Arc::new(InMemoryTaskRegistry::new(feed.clone()));
        let tracker = Arc::new(InMemoryAssignmentTracker::new());
        let clock = Arc::new(FixedClock::new(start()));
        let coordinator = ClaimCoordinator::new(registry.clone(), tracker.clone(), clock.clone());
        Fixture {
            coordinator,
            registry,
            tracker,
            feed,
            clock,
        }
    }

    async fn post(fx: &Fixture, window: Duration) -> Task {
        let request =
            DonationRequest::window_from(Donation::default(), start(), Duration::zero(), window);
        let task = Task::post(TaskId::from_ulid(Ulid::new()), request, start()).unwrap();
        fx.registry.insert(task.clone()).await.unwrap();
        task
    }

    /// Registry whose compare-and-swap hangs while `stalled` is set.
    struct StallingRegistry {
        inner: Arc<InMemoryTaskRegistry>,
        stalled: AtomicBool,
    }

    #[async_trait]
    impl TaskRegistry for StallingRegistry {
        async fn insert(&self, task: Task) -> Result<(), RescueError> {
            self.inner.insert(task).await
        }

        async fn get(&self, id: TaskId) -> Result<Task, RescueError> {
            self.inner.get(id).await
        }

        async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
            self.inner.list_by_status(status).await
        }

        async fn list_all(&self) -> Vec<Task> {
            self.inner.list_all().await
        }

        async fn compare_and_swap(
            &self,
            id: TaskId,
            expected_version: u64,
            transition: Transition,
        ) -> Result<Task, RescueError> {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.compare_and_swap(id, expected_version, transition).await
        }

        async fn counts(&self) -> RegistryCounts {
            self.inner.counts().await
        }
    }

    fn agent() -> AgentId {
        AgentId::from_ulid(Ulid::new())
    }

    #[tokio::test]
    async fn claim_takes_the_slot_and_records_one_event() {
        let fx = fixture();
        let task = post(&fx, Duration::hours(1)).await;
        let a = agent();

        let claimed = fx.coordinator.claim(a, task.id(), 1).await.unwrap();

        assert_eq!(claimed.status(), TaskStatus::Claimed);
        assert_eq!(claimed.claimed_by(), Some(a));
        assert_eq!(claimed.claimed_at(), Some(start()));
        assert_eq!(fx.tracker.active_task(a), Some(task.id()));
        assert_eq!(fx.feed.len(), 1);
    }

    #[tokio::test]
    async fn stale_claim_is_a_conflict_and_frees_the_slot() {
        let fx = fixture();
        let task = post(&fx, Duration::hours(1)).await;
        let (a, b) = (agent(), agent());
        fx.coordinator.claim(a, task.id(), 1).await.unwrap();

        let err = fx.coordinator.claim(b, task.id(), 1).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(fx.tracker.active_task(b), None);
        let current = fx.registry.get(task.id()).await.unwrap();
        assert_eq!(current.version(), 2);
        assert_eq!(current.claimed_by(), Some(a));
    }

    #[tokio::test]
    async fn expired_task_is_refused_before_touching_the_tracker() {
        let fx = fixture();
        let task = post(&fx, Duration::minutes(30)).await;
        fx.clock.advance(Duration::minutes(30));
        let a = agent();

        let err = fx.coordinator.claim(a, task.id(), 1).await.unwrap_err();

        assert!(matches!(err, RescueError::ExpiredTask { .. }));
        assert_eq!(fx.tracker.active_task(a), None);
        assert!(fx.feed.is_empty());
    }

    #[tokio::test]
    async fn busy_agent_cannot_claim_a_second_task() {
        let fx = fixture();
        let first = post(&fx, Duration::hours(1)).await;
        let second = post(&fx, Duration::hours(1)).await;
        let a = agent();
        fx.coordinator.claim(a, first.id(), 1).await.unwrap();

        let err = fx.coordinator.claim(a, second.id(), 1).await.unwrap_err();

        assert_eq!(
            err,
            RescueError::ActiveTaskExists {
                agent_id: a,
                active_task: first.id()
            }
        );
        assert_eq!(fx.registry.get(second.id()).await.unwrap(), second);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let fx = fixture();
        let id = TaskId::from_ulid(Ulid::new());
        let err = fx.coordinator.claim(agent(), id, 1).await.unwrap_err();
        assert_eq!(err, RescueError::NotFound(id));
    }

    #[tokio::test]
    async fn abandoned_claim_gives_the_slot_back() {
        let fx = fixture();
        let task = post(&fx, Duration::hours(1)).await;
        let registry = Arc::new(StallingRegistry {
            inner: fx.registry.clone(),
            stalled: AtomicBool::new(true),
        });
        let coordinator =
            ClaimCoordinator::new(registry.clone(), fx.tracker.clone(), fx.clock.clone());
        let a = agent();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            coordinator.claim(a, task.id(), 1),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(fx.tracker.active_task(a), None);
        assert!(fx.feed.is_empty());

        registry.stalled.store(false, Ordering::SeqCst);
        let claimed = coordinator.claim(a, task.id(), 1).await.unwrap();
        assert_eq!(claimed.claimed_by(), Some(a));
        assert_eq!(fx.tracker.active_task(a), Some(task.id()));
    }
}
