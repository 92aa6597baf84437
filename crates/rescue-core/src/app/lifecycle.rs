//! LifecycleAdvancer - 獲得後の状態遷移
//!
//! claimed → in_transit → delivered, by the claiming agent only. Delivery
//! also frees the agent's tracker slot.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{AgentId, RescueError, Task, TaskId, Transition};
use crate::ports::{AssignmentTracker, Clock, TaskRegistry};

#[derive(Clone)]
pub struct LifecycleAdvancer {
    registry: Arc<dyn TaskRegistry>,
    tracker: Arc<dyn AssignmentTracker>,
    clock: Arc<dyn Clock>,
}

impl LifecycleAdvancer {
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

    /// claimed → in_transit.
    pub async fn mark_picked_up(
        &self,
        agent: AgentId,
        task_id: TaskId,
        expected_version: u64,
    ) -> Result<Task, RescueError> {
        let transition = Transition::PickUp {
            agent,
            at: self.clock.now(),
        };
        let task = self.advance(task_id, expected_version, transition).await?;
        info!(task_id = %task_id, agent_id = %agent, version = task.version(), "task picked up");
        Ok(task)
    }

    /// in_transit → delivered. The agent is free to claim again afterwards.
    pub async fn mark_delivered(
        &self,
        agent: AgentId,
        task_id: TaskId,
        expected_version: u64,
    ) -> Result<Task, RescueError> {
        let transition = Transition::Deliver {
            agent,
            at: self.clock.now(),
        };
        let task = self.advance(task_id, expected_version, transition).await?;
        if !self.tracker.release(agent, task_id) {
            warn!(task_id = %task_id, agent_id = %agent, "delivered task was not in the agent's slot");
        }
        info!(task_id = %task_id, agent_id = %agent, version = task.version(), "task delivered");
        Ok(task)
    }

    async fn advance(
        &self,
        task_id: TaskId,
        expected_version: u64,
        transition: Transition,
    ) -> Result<Task, RescueError> {
        let result = self
            .registry
            .compare_and_swap(task_id, expected_version, transition)
            .await;
        match &result {
            Err(err @ RescueError::InvalidTransition { .. }) => {
                warn!(
                    task_id = %task_id,
                    agent_id = %transition.agent(),
                    error = %err,
                    "lifecycle step rejected"
                );
            }
            Err(err) => {
                debug!(
                    task_id = %task_id,
                    agent_id = %transition.agent(),
                    expected_version,
                    error = %err,
                    "lifecycle step not applied"
                );
            }
            Ok(_) => {}
        }
        result
    }
}
