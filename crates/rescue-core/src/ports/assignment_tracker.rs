//! AssignmentTracker port - エージェントごとの担当枠
//!
//! Holds, per agent, a reference to the one task it is working on. The task
//! itself records `claimed_by` independently for audit.

use crate::domain::{AgentId, RescueError, TaskId};

/// AssignmentTracker は 1 エージェント 1 タスクを保証
///
/// # 設計原則
/// - acquire/release serialize per agent only
/// - synchronous on purpose: a speculative acquisition must be releasable
///   from `Drop` when a claim is abandoned mid-flight
pub trait AssignmentTracker: Send + Sync {
    /// Reserve the agent's slot for `task`.
    ///
    /// Fails with `ActiveTaskExists` if the agent already holds any task,
    /// including `task` itself.
    fn try_acquire(&self, agent: AgentId, task: TaskId) -> Result<(), RescueError>;

    /// Free the slot if it currently holds `task`. Returns whether it did.
    fn release(&self, agent: AgentId, task: TaskId) -> bool;

    fn active_task(&self, agent: AgentId) -> Option<TaskId>;

    /// Number of agents currently holding a task.
    fn active_count(&self) -> usize;
}

/// Speculative acquisition, rolled back on drop unless committed.
pub struct SlotGuard<'a> {
    tracker: &'a dyn AssignmentTracker,
    agent: AgentId,
    task: TaskId,
    armed: bool,
}

impl<'a> SlotGuard<'a> {
    pub fn acquire(
        tracker: &'a dyn AssignmentTracker,
        agent: AgentId,
        task: TaskId,
    ) -> Result<Self, RescueError> {
        tracker.try_acquire(agent, task)?;
        Ok(Self {
            tracker,
            agent,
            task,
            armed: true,
        })
    }

    /// Keep the slot; the claim went through.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tracker.release(self.agent, self.task);
        }
    }
}
