//! Transition - the typed mutations accepted by the registry's CAS.
//!
//! Callers never touch task fields directly. They describe which step they
//! want and the registry applies it under the task's lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::AgentId;
use super::state::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Available -> Claimed, sets `claimed_by` and `claimed_at`.
    Claim { agent: AgentId, at: DateTime<Utc> },
    /// Claimed -> InTransit, sets `picked_up_at`.
    PickUp { agent: AgentId, at: DateTime<Utc> },
    /// InTransit -> Delivered, sets `delivered_at`.
    Deliver { agent: AgentId, at: DateTime<Utc> },
}

impl Transition {
    pub fn agent(&self) -> AgentId {
        match *self {
            Self::Claim { agent, .. } | Self::PickUp { agent, .. } | Self::Deliver { agent, .. } => {
                agent
            }
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match *self {
            Self::Claim { at, .. } | Self::PickUp { at, .. } | Self::Deliver { at, .. } => at,
        }
    }

    /// Status the task must be in for this transition to apply.
    pub fn source(&self) -> TaskStatus {
        match self {
            Self::Claim { .. } => TaskStatus::Available,
            Self::PickUp { .. } => TaskStatus::Claimed,
            Self::Deliver { .. } => TaskStatus::InTransit,
        }
    }

    /// Status the task ends in.
    pub fn target(&self) -> TaskStatus {
        match self {
            Self::Claim { .. } => TaskStatus::Claimed,
            Self::PickUp { .. } => TaskStatus::InTransit,
            Self::Deliver { .. } => TaskStatus::Delivered,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Claim { .. } => EventKind::Claimed,
            Self::PickUp { .. } => EventKind::PickedUp,
            Self::Deliver { .. } => EventKind::Delivered,
        }
    }
}

/// Kind of an accepted transition, as recorded in the event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Claimed,
    PickedUp,
    Delivered,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Claimed => "claimed",
            Self::PickedUp => "picked_up",
            Self::Delivered => "delivered",
        };
        write!(f, "{s}")
    }
}
