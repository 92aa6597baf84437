//! Marketplace - エージェント向けの参照系
//!
//! Read-only views over the registry and tracker. Expiry is evaluated here,
//! at read time, against the clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AgentId, RescueError, Task, TaskStatus, TimeLeft};
use crate::ports::{AssignmentTracker, Clock, TaskRegistry};

/// Marketplace tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityFilter {
    #[default]
    All,
    /// Urgent or high priority donations.
    Urgent,
    /// Less than the configured "soon" window left.
    ClosingSoon,
}

/// A task as shown on the board, with its time left evaluated at `now`.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub task: Task,
    pub time_left: TimeLeft,
}

#[derive(Clone)]
pub struct Marketplace {
    registry: Arc<dyn TaskRegistry>,
    tracker: Arc<dyn AssignmentTracker>,
    clock: Arc<dyn Clock>,
    urgent_window: Duration,
    soon_window: Duration,
}

impl Marketplace {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        tracker: Arc<dyn AssignmentTracker>,
        clock: Arc<dyn Clock>,
        urgent_window: Duration,
        soon_window: Duration,
    ) -> Self {
        Self {
            registry,
            tracker,
            clock,
            urgent_window,
            soon_window,
        }
    }

    pub fn time_left(&self, task: &Task) -> TimeLeft {
        TimeLeft::evaluate(task.pickup_end(), self.clock.now(), self.urgent_window)
    }

    /// Claimable tasks right now, newest posted first.
    pub async fn list_available(&self, filter: AvailabilityFilter) -> Vec<Listing> {
        self.list_available_at(self.clock.now(), filter).await
    }

    /// Same as `list_available`, evaluated at `now`.
    pub async fn list_available_at(
        &self,
        now: DateTime<Utc>,
        filter: AvailabilityFilter,
    ) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .registry
            .list_available()
            .await
            .into_iter()
            .filter_map(|task| {
                let time_left = TimeLeft::evaluate(task.pickup_end(), now, self.urgent_window);
                (!time_left.expired).then_some(Listing { task, time_left })
            })
            .filter(|listing| match filter {
                AvailabilityFilter::All => true,
                AvailabilityFilter::Urgent => listing.task.priority().is_pressing(),
                AvailabilityFilter::ClosingSoon => listing.time_left.within(self.soon_window),
            })
            .collect();
        listings.sort_by(|a, b| {
            b.task
                .posted_at()
                .cmp(&a.task.posted_at())
                .then_with(|| b.task.id().cmp(&a.task.id()))
        });
        listings
    }

    /// Number of tasks an agent could claim right now.
    pub async fn live_count(&self) -> usize {
        let now = self.clock.now();
        self.registry
            .list_available()
            .await
            .iter()
            .filter(|task| task.is_claimable_at(now))
            .count()
    }

    /// The task the agent currently holds, if any.
    pub async fn active_task(&self, agent: AgentId) -> Result<Option<Task>, RescueError> {
        match self.tracker.active_task(agent) {
            Some(id) => self.registry.get(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Tasks the agent delivered, latest first.
    pub async fn deliveries_for(&self, agent: AgentId) -> Vec<Task> {
        let mut delivered: Vec<Task> = self
            .registry
            .list_by_status(TaskStatus::Delivered)
            .await
            .into_iter()
            .filter(|task| task.claimed_by() == Some(agent))
            .collect();
        delivered.sort_by(|a, b| b.delivered_at().cmp(&a.delivered_at()));
        delivered
    }

    /// What receivers see: tasks on the way and tasks already handed over.
    pub async fn in_flight(&self) -> Vec<Task> {
        let mut tasks = self.registry.list_by_status(TaskStatus::InTransit).await;
        tasks.extend(self.registry.list_by_status(TaskStatus::Delivered).await);
        tasks
    }

    /// Donor history: everything `donor_name` posted, in any status, newest first.
    pub async fn posts_by(&self, donor_name: &str) -> Vec<Task> {
        let mut posted: Vec<Task> = self
            .registry
            .list_all()
            .await
            .into_iter()
            .filter(|task| task.donation().donor_name == donor_name)
            .collect();
        posted.sort_by(|a, b| {
            b.posted_at()
                .cmp(&a.posted_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        posted
    }
}
