//! Errors - エラー型と分類
//!
//! Every rejected operation surfaces one of these; nothing is swallowed.

use chrono::{DateTime, Utc};

use super::ids::{AgentId, TaskId};
use super::state::TaskStatus;

/// ErrorKind は拒否理由の運用分類
///
/// - Contention: another writer got there first (routine, retryable)
/// - StaleView: the caller acted on outdated information (refetch, don't retry blindly)
/// - ProtocolViolation: the caller broke the lifecycle protocol (a bug)
/// - InvalidInput: intake rejected the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Contention,
    StaleView,
    ProtocolViolation,
    InvalidInput,
}

/// Why a lifecycle transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The task is not in the status the transition starts from.
    WrongStatus,
    /// The caller is not the agent that claimed the task.
    NotClaimant,
    /// The task is delivered; nothing follows.
    Terminal,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WrongStatus => "wrong status",
            Self::NotClaimant => "agent did not claim this task",
            Self::Terminal => "task is delivered",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RescueError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {task_id} expired at {pickup_end}")]
    ExpiredTask {
        task_id: TaskId,
        pickup_end: DateTime<Utc>,
    },

    #[error("agent {agent_id} already holds active task {active_task}")]
    ActiveTaskExists {
        agent_id: AgentId,
        active_task: TaskId,
    },

    #[error(
        "task {task_id} conflict: expected version {expected}, found version {current} ({status})"
    )]
    VersionConflict {
        task_id: TaskId,
        expected: u64,
        current: u64,
        status: TaskStatus,
    },

    #[error("task {task_id} cannot go from {from} to {to}: {reason}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        reason: InvalidReason,
    },

    #[error("pickup window must end after it starts ({start} .. {end})")]
    InvalidPickupWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("weight must be a non-negative number of kg, got {0}")]
    InvalidWeight(f64),

    #[error("task {0} is already registered")]
    DuplicateTask(TaskId),
}

impl RescueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VersionConflict { .. } => ErrorKind::Contention,
            Self::NotFound(_) | Self::ExpiredTask { .. } | Self::ActiveTaskExists { .. } => {
                ErrorKind::StaleView
            }
            Self::InvalidTransition { .. } => ErrorKind::ProtocolViolation,
            Self::InvalidPickupWindow { .. } | Self::InvalidWeight(_) | Self::DuplicateTask(_) => {
                ErrorKind::InvalidInput
            }
        }
    }

    /// Only contention is worth retrying (after a refetch).
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Contention
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn only_version_conflicts_are_retryable() {
        let task_id = TaskId::from_ulid(Ulid::new());
        let conflict = RescueError::VersionConflict {
            task_id,
            expected: 1,
            current: 2,
            status: TaskStatus::Claimed,
        };
        let invalid = RescueError::InvalidTransition {
            task_id,
            from: TaskStatus::Delivered,
            to: TaskStatus::Delivered,
            reason: InvalidReason::Terminal,
        };

        assert!(conflict.is_retryable());
        assert_eq!(invalid.kind(), ErrorKind::ProtocolViolation);
        assert!(!invalid.is_retryable());
        assert!(!RescueError::NotFound(task_id).is_retryable());
    }

    #[test]
    fn messages_name_the_task() {
        let task_id = TaskId::from_ulid(Ulid::new());
        let msg = RescueError::NotFound(task_id).to_string();
        assert!(msg.contains(&task_id.to_string()));
    }
}
