//! Task record: donation payload + lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{InvalidReason, RescueError};
use super::expiry;
use super::ids::{AgentId, TaskId};
use super::state::{Priority, TaskStatus};
use super::transition::Transition;

/// Descriptive payload supplied by the donor. Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub food_type: String,
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub donor_name: String,
    pub address: String,
}

/// Intake payload for a new donation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub donation: Donation,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    pub pickup_start: DateTime<Utc>,
    pub pickup_end: DateTime<Utc>,
}

impl DonationRequest {
    pub fn new(
        donation: Donation,
        pickup_start: DateTime<Utc>,
        pickup_end: DateTime<Utc>,
    ) -> Self {
        Self {
            donation,
            priority: Priority::Normal,
            weight_kg: None,
            pickup_start,
            pickup_end,
        }
    }

    /// Builder: window opening `start_in` from `now` and lasting `window`.
    pub fn window_from(
        donation: Donation,
        now: DateTime<Utc>,
        start_in: chrono::Duration,
        window: chrono::Duration,
    ) -> Self {
        let start = now + start_in;
        Self::new(donation, start, start + window)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight_kg(mut self, kg: f64) -> Self {
        self.weight_kg = Some(kg);
        self
    }

    /// Checks the two fields the core relies on.
    pub fn validate(&self) -> Result<(), RescueError> {
        if self.pickup_end <= self.pickup_start {
            return Err(RescueError::InvalidPickupWindow {
                start: self.pickup_start,
                end: self.pickup_end,
            });
        }
        if let Some(kg) = self.weight_kg
            && !(kg.is_finite() && kg >= 0.0)
        {
            return Err(RescueError::InvalidWeight(kg));
        }
        Ok(())
    }
}

/// A rescue task.
///
/// Fields are read-only from outside the domain: the only way to change a
/// stored task is `TaskRegistry::compare_and_swap`, which calls `apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    status: TaskStatus,
    version: u64,
    priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight_kg: Option<f64>,
    pickup_start: DateTime<Utc>,
    pickup_end: DateTime<Utc>,
    posted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claimed_by: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picked_up_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delivered_at: Option<DateTime<Utc>>,
    donation: Donation,
}

impl Task {
    pub const INITIAL_VERSION: u64 = 1;

    /// New available task at version 1. Validates the request first.
    pub fn post(
        id: TaskId,
        request: DonationRequest,
        posted_at: DateTime<Utc>,
    ) -> Result<Self, RescueError> {
        request.validate()?;
        Ok(Self {
            id,
            status: TaskStatus::Available,
            version: Self::INITIAL_VERSION,
            priority: request.priority,
            weight_kg: request.weight_kg,
            pickup_start: request.pickup_start,
            pickup_end: request.pickup_end,
            posted_at,
            claimed_by: None,
            claimed_at: None,
            picked_up_at: None,
            delivered_at: None,
            donation: request.donation,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn weight_kg(&self) -> Option<f64> {
        self.weight_kg
    }

    pub fn pickup_start(&self) -> DateTime<Utc> {
        self.pickup_start
    }

    pub fn pickup_end(&self) -> DateTime<Utc> {
        self.pickup_end
    }

    pub fn posted_at(&self) -> DateTime<Utc> {
        self.posted_at
    }

    pub fn claimed_by(&self) -> Option<AgentId> {
        self.claimed_by
    }

    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
    }

    pub fn picked_up_at(&self) -> Option<DateTime<Utc>> {
        self.picked_up_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn donation(&self) -> &Donation {
        &self.donation
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        expiry::is_expired(self.pickup_end, now)
    }

    /// Available and not expired at `now`.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Available && !self.is_expired_at(now)
    }

    /// Validate and apply one transition, bumping the version.
    ///
    /// Check order matters:
    /// - claims: status, then expiry, then version. Any status other than
    ///   Available means someone else won, which is a conflict.
    /// - pickup/delivery: terminal, status and claimant before version, so a
    ///   replayed delivery reports InvalidTransition rather than a conflict.
    ///
    /// On error the task is untouched.
    pub(crate) fn apply(
        &mut self,
        expected_version: u64,
        transition: &Transition,
    ) -> Result<(), RescueError> {
        match transition {
            Transition::Claim { at, .. } => {
                if self.status != TaskStatus::Available {
                    return Err(self.conflict(expected_version));
                }
                if self.is_expired_at(*at) {
                    return Err(RescueError::ExpiredTask {
                        task_id: self.id,
                        pickup_end: self.pickup_end,
                    });
                }
            }
            Transition::PickUp { agent, .. } | Transition::Deliver { agent, .. } => {
                let reason = if self.status.is_terminal() {
                    Some(InvalidReason::Terminal)
                } else if self.status != transition.source() {
                    Some(InvalidReason::WrongStatus)
                } else if self.claimed_by != Some(*agent) {
                    Some(InvalidReason::NotClaimant)
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(RescueError::InvalidTransition {
                        task_id: self.id,
                        from: self.status,
                        to: transition.target(),
                        reason,
                    });
                }
            }
        }

        if self.version != expected_version {
            return Err(self.conflict(expected_version));
        }
        debug_assert!(self.status.can_transition_to(transition.target()));

        match *transition {
            Transition::Claim { agent, at } => {
                self.claimed_by = Some(agent);
                self.claimed_at = Some(at);
            }
            Transition::PickUp { at, .. } => self.picked_up_at = Some(at),
            Transition::Deliver { at, .. } => self.delivered_at = Some(at),
        }
        self.status = transition.target();
        self.version += 1;
        Ok(())
    }

    fn conflict(&self, expected_version: u64) -> RescueError {
        RescueError::VersionConflict {
            task_id: self.id,
            expected: expected_version,
            current: self.version,
            status: self.status,
        }
    }
}
