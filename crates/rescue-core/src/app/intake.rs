//! DonationIntake - 寄付の受付
//!
//! The only place new tasks enter the registry.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{DonationRequest, RescueError, Task};
use crate::ports::{Clock, IdGenerator, TaskRegistry};

#[derive(Clone)]
pub struct DonationIntake {
    registry: Arc<dyn TaskRegistry>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl DonationIntake {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            ids,
            clock,
        }
    }

    /// Validate the request and register it as an available task at version 1.
    pub async fn post_donation(&self, request: DonationRequest) -> Result<Task, RescueError> {
        let food_type = request.donation.food_type.clone();
        let task = match Task::post(self.ids.generate_task_id(), request, self.clock.now()) {
            Ok(task) => task,
            Err(err) => {
                warn!(food_type = %food_type, error = %err, "donation rejected");
                return Err(err);
            }
        };
        self.registry.insert(task.clone()).await?;
        info!(
            task_id = %task.id(),
            food_type = %food_type,
            priority = ?task.priority(),
            pickup_end = %task.pickup_end(),
            "donation posted"
        );
        Ok(task)
    }
}
