//! rescue-core
//!
//! Task lifecycle and claim coordination for a food rescue network: donors
//! post pickups, volunteer agents race to claim them, and every accepted step
//! is recorded once in an append-only feed.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, state, transition, expiry, events, errors, impact）
//! - **ports**: 抽象化レイヤー（TaskRegistry, AssignmentTracker, EventFeed, Clock, IdGenerator）
//! - **impls**: in-memory implementations of the ports
//! - **app**: アプリケーションロジック（builder, coordinator, lifecycle, intake, query, stats）
//! - **config**: `RescueConfig` and its environment overrides
//! - **observability**: registry counts

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use crate::app::{AppBuilder, AvailabilityFilter, BuildError, ImpactStats, RescueService};
pub use crate::config::{ConfigError, RescueConfig};
pub use crate::domain::{AgentId, RescueError, Task, TaskId, TaskStatus};
