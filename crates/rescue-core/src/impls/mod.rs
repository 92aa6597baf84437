//! Impls - 実装（開発用・テスト用）
//!
//! In-memory implementations of the ports. A durable deployment swaps the
//! registry and feed for store-backed ones; the coordination logic in `app`
//! does not change.

pub mod inmem_feed;
pub mod inmem_registry;
pub mod inmem_tracker;

pub use self::inmem_feed::InMemoryEventFeed;
pub use self::inmem_registry::InMemoryTaskRegistry;
pub use self::inmem_tracker::InMemoryAssignmentTracker;
