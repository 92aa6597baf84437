//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - Every port defaults to its in-memory implementation

use std::sync::Arc;

use crate::app::{
    AvailabilityFilter, ClaimCoordinator, DonationIntake, ImpactStats, LifecycleAdvancer, Listing,
    Marketplace, StatsAggregator,
};
use crate::config::{ConfigError, RescueConfig};
use crate::domain::{AgentId, DonationRequest, RescueError, Task, TaskId, TimeLeft};
use crate::impls::{InMemoryAssignmentTracker, InMemoryEventFeed, InMemoryTaskRegistry};
use crate::observability::RegistryCounts;
use crate::ports::{
    AssignmentTracker, Clock, EventFeed, IdGenerator, SystemClock, TaskRegistry, UlidGenerator,
};

/// AppBuilder は RescueService を構築
///
/// # 使用例
/// ```ignore
/// let service = AppBuilder::new()
///     .with_config(RescueConfig::from_env()?)
///     .with_clock(Arc::new(SystemClock))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定を検証
/// - a registry is always supplied together with the feed it appends to
pub struct AppBuilder {
    config: RescueConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    store: Option<(Arc<dyn TaskRegistry>, Arc<dyn EventFeed>)>,
    tracker: Option<Arc<dyn AssignmentTracker>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: RescueConfig::default(),
            clock: None,
            ids: None,
            store: None,
            tracker: None,
        }
    }

    pub fn with_config(mut self, config: RescueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Use an existing registry. `feed` must be the feed that registry
    /// appends accepted transitions to.
    pub fn with_store(mut self, registry: Arc<dyn TaskRegistry>, feed: Arc<dyn EventFeed>) -> Self {
        self.store = Some((registry, feed));
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn AssignmentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// # 検証
    /// - `RescueConfig::validate` が通らなければ BuildError::InvalidConfig
    pub fn build(self) -> Result<RescueService, BuildError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let (registry, feed) = self.store.unwrap_or_else(|| {
            let feed: Arc<dyn EventFeed> =
                Arc::new(InMemoryEventFeed::new(self.config.event_capacity));
            let registry: Arc<dyn TaskRegistry> =
                Arc::new(InMemoryTaskRegistry::new(feed.clone()));
            (registry, feed)
        });
        let tracker = self
            .tracker
            .unwrap_or_else(|| Arc::new(InMemoryAssignmentTracker::new()));

        let market = Marketplace::new(
            registry.clone(),
            tracker.clone(),
            clock.clone(),
            self.config.urgent_window,
            self.config.soon_window,
        );

        Ok(RescueService {
            coordinator: ClaimCoordinator::new(registry.clone(), tracker.clone(), clock.clone()),
            lifecycle: LifecycleAdvancer::new(registry.clone(), tracker.clone(), clock.clone()),
            intake: DonationIntake::new(registry.clone(), ids.clone(), clock.clone()),
            stats: StatsAggregator::new(feed.clone(), registry.clone(), market.clone()),
            market,
            config: self.config,
            clock,
            ids,
            registry,
            tracker,
            feed,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RescueService はコーディネーションコアの表面
///
/// Cheap to clone; clones share the same registry, tracker and feed.
#[derive(Clone)]
pub struct RescueService {
    config: RescueConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    registry: Arc<dyn TaskRegistry>,
    tracker: Arc<dyn AssignmentTracker>,
    feed: Arc<dyn EventFeed>,
    coordinator: ClaimCoordinator,
    lifecycle: LifecycleAdvancer,
    intake: DonationIntake,
    market: Marketplace,
    stats: StatsAggregator,
}

impl RescueService {
    pub async fn post_donation(&self, request: DonationRequest) -> Result<Task, RescueError> {
        self.intake.post_donation(request).await
    }

    pub async fn claim(
        &self,
        agent: AgentId,
        task_id: TaskId,
        expected_version: u64,
    ) -> Result<Task, RescueError> {
        self.coordinator.claim(agent, task_id, expected_version).await
    }

    pub async fn mark_picked_up(
        &self,
        agent: AgentId,
        task_id: TaskId,
        expected_version: u64,
    ) -> Result<Task, RescueError> {
        self.lifecycle
            .mark_picked_up(agent, task_id, expected_version)
            .await
    }

    pub async fn mark_delivered(
        &self,
        agent: AgentId,
        task_id: TaskId,
        expected_version: u64,
    ) -> Result<Task, RescueError> {
        self.lifecycle
            .mark_delivered(agent, task_id, expected_version)
            .await
    }

    pub async fn get(&self, task_id: TaskId) -> Result<Task, RescueError> {
        self.registry.get(task_id).await
    }

    pub async fn list_available(&self, filter: AvailabilityFilter) -> Vec<Listing> {
        self.market.list_available(filter).await
    }

    pub fn time_left(&self, task: &Task) -> TimeLeft {
        self.market.time_left(task)
    }

    pub async fn active_task(&self, agent: AgentId) -> Result<Option<Task>, RescueError> {
        self.market.active_task(agent).await
    }

    pub async fn deliveries_for(&self, agent: AgentId) -> Vec<Task> {
        self.market.deliveries_for(agent).await
    }

    pub async fn in_flight(&self) -> Vec<Task> {
        self.market.in_flight().await
    }

    pub async fn posts_by(&self, donor_name: &str) -> Vec<Task> {
        self.market.posts_by(donor_name).await
    }

    pub async fn impact_stats(&self) -> ImpactStats {
        self.stats.refresh().await
    }

    pub async fn counts(&self) -> RegistryCounts {
        self.registry.counts().await
    }

    /// Mint an id for a new agent.
    pub fn register_agent(&self) -> AgentId {
        self.ids.generate_agent_id()
    }

    pub fn config(&self) -> &RescueConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn feed(&self) -> &Arc<dyn EventFeed> {
        &self.feed
    }

    pub fn tracker(&self) -> &Arc<dyn AssignmentTracker> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Donation;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn build_with_defaults() {
        let service = AppBuilder::new().build();
        assert!(service.is_ok());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = RescueConfig {
            event_capacity: 0,
            ..RescueConfig::default()
        };
        let service = AppBuilder::new().with_config(config).build();
        assert!(matches!(service, Err(BuildError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn supplied_store_is_used() {
        let feed = Arc::new(InMemoryEventFeed::new(8));
        let registry = Arc::new(InMemoryTaskRegistry::new(feed.clone()));
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let service = AppBuilder::new()
            .with_clock(Arc::new(FixedClock::new(start)))
            .with_store(registry.clone(), feed.clone())
            .build()
            .unwrap();

        let request =
            DonationRequest::window_from(Donation::default(), start, Duration::zero(), Duration::hours(1));
        let task = service.post_donation(request).await.unwrap();
        let agent = service.register_agent();
        service.claim(agent, task.id(), 1).await.unwrap();

        assert_eq!(registry.counts().await.claimed, 1);
        assert_eq!(feed.len(), 1);
        assert_eq!(service.active_task(agent).await.unwrap().map(|t| t.id()), Some(task.id()));
    }
}
