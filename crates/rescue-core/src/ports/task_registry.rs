//! TaskRegistry port - タスク状態の正本（source of truth）
//!
//! The registry owns status and version for every task. It is deliberately
//! dumb about time: `list_available` does not filter expired tasks, callers
//! do that through the expiry evaluator.

use async_trait::async_trait;

use crate::domain::{RescueError, Task, TaskId, TaskStatus, Transition};
use crate::observability::RegistryCounts;

/// TaskRegistry は状態の正本
///
/// # 設計原則
/// - `compare_and_swap` is the only write path for an existing task
/// - CAS is atomic per task id; distinct ids never wait on each other
/// - the event for an accepted transition is recorded inside the same
///   critical section as the state change (outbox)
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Register a freshly posted task. Fails if the id is taken.
    async fn insert(&self, task: Task) -> Result<(), RescueError>;

    async fn get(&self, id: TaskId) -> Result<Task, RescueError>;

    /// Tasks whose stored status is Available, expired or not.
    async fn list_available(&self) -> Vec<Task> {
        self.list_by_status(TaskStatus::Available).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> Vec<Task>;

    /// Every task, whatever its status.
    async fn list_all(&self) -> Vec<Task>;

    /// Apply `transition` if the stored version equals `expected_version`.
    ///
    /// Returns the updated task. On any error the stored task is unchanged
    /// and no event is recorded.
    async fn compare_and_swap(
        &self,
        id: TaskId,
        expected_version: u64,
        transition: Transition,
    ) -> Result<Task, RescueError>;

    async fn counts(&self) -> RegistryCounts;
}
