use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

/// Tasks per stored status. Expiry is not reflected here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub available: usize,
    pub claimed: usize,
    pub in_transit: usize,
    pub delivered: usize,
}

impl RegistryCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Available => self.available += 1,
            TaskStatus::Claimed => self.claimed += 1,
            TaskStatus::InTransit => self.in_transit += 1,
            TaskStatus::Delivered => self.delivered += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.claimed + self.in_transit + self.delivered
    }

    /// Claimed plus in transit.
    pub fn active(&self) -> usize {
        self.claimed + self.in_transit
    }
}
