//! Events - 受理された状態遷移の記録
//!
//! One event per accepted transition; rejected attempts leave no trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AgentId, TaskId};
use super::task::Task;
use super::transition::{EventKind, Transition};

/// Position of an event in the feed, starting at 0.
pub type FeedOffset = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub offset: FeedOffset,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub kind: EventKind,
    /// Task version after the transition (2 for a claim, 4 for a delivery).
    pub version: u64,
    pub at: DateTime<Utc>,
}

/// Event contents before the feed assigns an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub kind: EventKind,
    pub version: u64,
    pub at: DateTime<Utc>,
}

impl PendingEvent {
    /// Describe a transition that was just applied to `task`.
    pub fn accepted(task: &Task, transition: &Transition) -> Self {
        Self {
            task_id: task.id(),
            agent_id: transition.agent(),
            kind: transition.kind(),
            version: task.version(),
            at: transition.at(),
        }
    }

    pub fn at_offset(self, offset: FeedOffset) -> TransitionEvent {
        TransitionEvent {
            offset,
            task_id: self.task_id,
            agent_id: self.agent_id,
            kind: self.kind,
            version: self.version,
            at: self.at,
        }
    }
}
