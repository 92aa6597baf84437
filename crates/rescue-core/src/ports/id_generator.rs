//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{AgentId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は分散システムで使える ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_agent_id(&self) -> AgentId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// The timestamp half comes from the clock, so a `FixedClock` yields ids
/// with a deterministic time prefix.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_agent_id(&self) -> AgentId {
        AgentId::from(self.next_ulid())
    }
}
