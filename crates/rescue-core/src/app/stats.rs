//! Impact stats - フィードからの集計
//!
//! Folds `delivered` events from the feed into running totals. The aggregator
//! remembers how far it has read, so each `refresh` only looks at new events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{EventKind, FeedOffset, Impact, TransitionEvent};
use crate::app::Marketplace;
use crate::ports::{EventFeed, FeedCursor, TaskRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactStats {
    pub meals_rescued: u64,
    pub co2_avoided_kg: f64,
    pub water_saved_litres: u64,
    pub deliveries_done: u64,
    /// Claimable right now; not part of the running totals.
    pub live_donations: usize,
}

#[derive(Debug, Default)]
struct Tally {
    next_offset: FeedOffset,
    impact: Impact,
    deliveries: u64,
}

#[derive(Clone)]
pub struct StatsAggregator {
    feed: Arc<dyn EventFeed>,
    registry: Arc<dyn TaskRegistry>,
    market: Marketplace,
    tally: Arc<Mutex<Tally>>,
}

impl StatsAggregator {
    pub fn new(
        feed: Arc<dyn EventFeed>,
        registry: Arc<dyn TaskRegistry>,
        market: Marketplace,
    ) -> Self {
        Self {
            feed,
            registry,
            market,
            tally: Arc::new(Mutex::new(Tally::default())),
        }
    }

    /// Catch up with the feed and return the current totals.
    ///
    /// The tally and its offset are only written once every new event has
    /// been resolved, so a refresh dropped mid-way counts nothing.
    pub async fn refresh(&self) -> ImpactStats {
        let mut tally = self.tally.lock().await;

        let (delivered, next_offset) = {
            let mut cursor = FeedCursor::new(self.feed.as_ref(), tally.next_offset);
            let delivered: Vec<TransitionEvent> = cursor
                .by_ref()
                .filter(|event| event.kind == EventKind::Delivered)
                .collect();
            (delivered, cursor.next_offset())
        };

        let mut impact = tally.impact;
        let mut deliveries = tally.deliveries;
        for event in delivered {
            deliveries += 1;
            match self.registry.get(event.task_id).await {
                Ok(task) => {
                    if let Some(gained) = Impact::from_weight(task.weight_kg()) {
                        impact = impact + gained;
                    }
                }
                Err(err) => {
                    warn!(task_id = %event.task_id, error = %err, "delivered task missing from registry");
                }
            }
        }
        tally.impact = impact;
        tally.deliveries = deliveries;
        tally.next_offset = next_offset;

        let live_donations = self.market.live_count().await;

        ImpactStats {
            meals_rescued: tally.impact.meals,
            co2_avoided_kg: tally.impact.co2_kg,
            water_saved_litres: tally.impact.water_litres,
            deliveries_done: tally.deliveries,
            live_donations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AgentId, Donation, DonationRequest, RescueError, Task, TaskId, TaskStatus, Transition,
    };
    use crate::impls::{InMemoryAssignmentTracker, InMemoryEventFeed, InMemoryTaskRegistry};
    use crate::observability::RegistryCounts;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use ulid::Ulid;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn aggregator(feed: Arc<InMemoryEventFeed>, registry: Arc<dyn TaskRegistry>) -> StatsAggregator {
        let market = Marketplace::new(
            registry.clone(),
            Arc::new(InMemoryAssignmentTracker::new()),
            Arc::new(FixedClock::new(start())),
            Duration::minutes(30),
            Duration::minutes(60),
        );
        StatsAggregator::new(feed, registry, market)
    }

    /// Registry whose reads take a while.
    struct SlowReads {
        inner: InMemoryTaskRegistry,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl TaskRegistry for SlowReads {
        async fn insert(&self, task: Task) -> Result<(), RescueError> {
            self.inner.insert(task).await
        }

        async fn get(&self, id: TaskId) -> Result<Task, RescueError> {
            tokio::time::sleep(self.delay).await;
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
            self.inner.compare_and_swap(id, expected_version, transition).await
        }

        async fn counts(&self) -> RegistryCounts {
            self.inner.counts().await
        }
    }

    async fn post(registry: &InMemoryTaskRegistry, weight_kg: Option<f64>) -> TaskId {
        let mut request = DonationRequest::window_from(
            Donation::default(),
            start(),
            Duration::zero(),
            Duration::hours(2),
        );
        request.weight_kg = weight_kg;
        let task = Task::post(TaskId::from_ulid(Ulid::new()), request, start()).unwrap();
        let id = task.id();
        registry.insert(task).await.unwrap();
        id
    }

    async fn deliver(registry: &InMemoryTaskRegistry, id: TaskId) {
        let agent = AgentId::from_ulid(Ulid::new());
        let at = start();
        let steps = [
            Transition::Claim { agent, at },
            Transition::PickUp { agent, at },
            Transition::Deliver { agent, at },
        ];
        for (i, step) in steps.into_iter().enumerate() {
            registry.compare_and_swap(id, i as u64 + 1, step).await.unwrap();
        }
    }

    #[tokio::test]
    async fn totals_follow_delivered_events_only() {
        let feed = Arc::new(InMemoryEventFeed::new(16));
        let registry = Arc::new(InMemoryTaskRegistry::new(feed.clone()));
        let stats = aggregator(feed, registry.clone());

        let ten = post(&registry, Some(10.0)).await;
        let unweighed = post(&registry, None).await;
        let _waiting = post(&registry, Some(4.0)).await;

        deliver(&registry, ten).await;
        let first = stats.refresh().await;
        assert_eq!(first.deliveries_done, 1);
        assert_eq!(first.meals_rescued, 20);
        assert_eq!(first.co2_avoided_kg, 25.0);
        assert_eq!(first.water_saved_litres, 2900);
        assert_eq!(first.live_donations, 2);

        deliver(&registry, unweighed).await;
        let second = stats.refresh().await;
        assert_eq!(second.deliveries_done, 2);
        assert_eq!(second.meals_rescued, 20);
        assert_eq!(second.live_donations, 1);

        // nothing new: totals stay put
        assert_eq!(stats.refresh().await, second);
    }

    #[tokio::test]
    async fn refresh_dropped_mid_way_counts_nothing() {
        let feed = Arc::new(InMemoryEventFeed::new(16));
        let registry = Arc::new(SlowReads {
            inner: InMemoryTaskRegistry::new(feed.clone()),
            delay: std::time::Duration::from_millis(200),
        });
        let stats = aggregator(feed, registry.clone());

        let ten = post(&registry.inner, Some(10.0)).await;
        deliver(&registry.inner, ten).await;

        let dropped =
            tokio::time::timeout(std::time::Duration::from_millis(20), stats.refresh()).await;
        assert!(dropped.is_err());

        let totals = stats.refresh().await;
        assert_eq!(totals.deliveries_done, 1);
        assert_eq!(totals.meals_rescued, 20);
        assert_eq!(stats.refresh().await, totals);
    }
}
