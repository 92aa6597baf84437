//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。Each trait is the seam between the
//! coordination core and whatever backs it (durable store, shared cache,
//! message bus). The in-memory implementations live in `impls`.

pub mod assignment_tracker;
pub mod clock;
pub mod event_feed;
pub mod id_generator;
pub mod task_registry;

pub use self::assignment_tracker::{AssignmentTracker, SlotGuard};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_feed::{EventFeed, FeedCursor};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_registry::TaskRegistry;
