//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **ClaimCoordinator**: expiry → tracker slot → CAS
//! - **LifecycleAdvancer**: pickup and delivery by the claimant
//! - **DonationIntake**: new tasks
//! - **Marketplace**: read-side views (board, agent history)
//! - **StatsAggregator**: impact totals folded from the feed

pub mod builder;
pub mod coordinator;
pub mod intake;
pub mod lifecycle;
pub mod query;
pub mod stats;

// 主要な型を再エクスポート
pub use self::builder::{AppBuilder, BuildError, RescueService};
pub use self::coordinator::ClaimCoordinator;
pub use self::intake::DonationIntake;
pub use self::lifecycle::LifecycleAdvancer;
pub use self::query::{AvailabilityFilter, Listing, Marketplace};
pub use self::stats::{ImpactStats, StatsAggregator};
