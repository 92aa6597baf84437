//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + Phantom type
//! Every identifier is a ULID wrapped in `Id<T>`, where `T` is a zero-sized
//! marker. `TaskId` and `AgentId` share one implementation but cannot be
//! mixed up: passing an agent id where a task id is expected does not compile.
//!
//! ## ULID の特性
//! - **時刻でソート可能**: ids minted later sort later
//! - **分散生成可能**: no coordination between intake nodes
//! - 128-bit, same size as a UUID

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Provides the prefix used by `Display` and `FromStr`.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID identifier tagged with a marker type.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when parsing an id from its display form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{input}': expected '{prefix}<ulid>'")]
pub struct ParseIdError {
    input: String,
    prefix: &'static str,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    /// Accepts both `task-01H...` and the bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError {
                input: s.to_string(),
                prefix: T::prefix(),
            })
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Rescue task marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Agent (volunteer) marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agent {}

impl IdMarker for Agent {
    fn prefix() -> &'static str {
        "agent-"
    }
}

/// Identifier of a rescue task.
pub type TaskId = Id<Task>;

/// Identifier of a pre-authenticated agent.
pub type AgentId = Id<Agent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let task = TaskId::from_ulid(ulid1);
        let agent = AgentId::from_ulid(ulid2);

        assert_eq!(task.as_ulid(), ulid1);
        assert_eq!(agent.as_ulid(), ulid2);

        assert!(task.to_string().starts_with("task-"));
        assert!(agent.to_string().starts_with("agent-"));

        // let _: TaskId = agent; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = TaskId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TaskId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn ids_serialize_as_bare_ulid() {
        let task_id = TaskId::from_ulid(Ulid::new());

        let serialized = serde_json::to_string(&task_id).unwrap();
        assert_eq!(serialized, format!("\"{}\"", task_id.as_ulid()));

        let deserialized: TaskId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(task_id, deserialized);
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_forms() {
        let agent = AgentId::from_ulid(Ulid::new());

        let prefixed: AgentId = agent.to_string().parse().unwrap();
        let bare: AgentId = agent.as_ulid().to_string().parse().unwrap();

        assert_eq!(prefixed, agent);
        assert_eq!(bare, agent);
        assert!("agent-not-a-ulid".parse::<AgentId>().is_err());
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<TaskId>(), size_of::<Ulid>());
        assert_eq!(size_of::<AgentId>(), 16);
    }
}
