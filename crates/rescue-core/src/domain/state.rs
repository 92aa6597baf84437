//! State - タスクの状態
//!
//! Rescue task status and priority.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status.
///
/// State transitions (forward only, one step at a time):
/// - Available -> Claimed -> InTransit -> Delivered
///
/// A failed claim leaves the task Available; nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Posted and waiting for an agent.
    Available,

    /// Claimed by an agent, not yet picked up.
    Claimed,

    /// Picked up, on the way to the receiver.
    InTransit,

    /// Handed over. Terminal.
    Delivered,
}

impl TaskStatus {
    /// The only status this one may advance to.
    pub fn next(self) -> Option<TaskStatus> {
        match self {
            TaskStatus::Available => Some(TaskStatus::Claimed),
            TaskStatus::Claimed => Some(TaskStatus::InTransit),
            TaskStatus::InTransit => Some(TaskStatus::Delivered),
            TaskStatus::Delivered => None,
        }
    }

    pub fn can_transition_to(self, target: TaskStatus) -> bool {
        self.next() == Some(target)
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Delivered)
    }

    /// Does a task in this state occupy its agent's assignment slot?
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Claimed | TaskStatus::InTransit)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
        };
        write!(f, "{s}")
    }
}

/// Donor-assigned priority. Informational: claims are first-writer-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Urgent and high priority donations, as surfaced by the urgent filter.
    pub fn is_pressing(self) -> bool {
        matches!(self, Priority::Urgent | Priority::High)
    }
}
