//! InMemoryAssignmentTracker - エージェントごとの担当枠
//!
//! One mutex-protected slot per agent. The outer map lock is only taken to
//! find or create a slot, so agents never contend with each other on acquire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::trace;

use crate::domain::{AgentId, RescueError, TaskId};
use crate::ports::AssignmentTracker;

type Slot = Arc<Mutex<Option<TaskId>>>;

#[derive(Default)]
pub struct InMemoryAssignmentTracker {
    slots: RwLock<HashMap<AgentId, Slot>>,
}

impl InMemoryAssignmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_slot(&self, agent: AgentId) -> Option<Slot> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(&agent).cloned()
    }

    fn slot(&self, agent: AgentId) -> Slot {
        if let Some(slot) = self.existing_slot(agent) {
            return slot;
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.entry(agent).or_default().clone()
    }
}

impl AssignmentTracker for InMemoryAssignmentTracker {
    fn try_acquire(&self, agent: AgentId, task: TaskId) -> Result<(), RescueError> {
        let slot = self.slot(agent);
        let mut held = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(active_task) = *held {
            return Err(RescueError::ActiveTaskExists {
                agent_id: agent,
                active_task,
            });
        }
        *held = Some(task);
        trace!(agent_id = %agent, task_id = %task, "assignment slot acquired");
        Ok(())
    }

    fn release(&self, agent: AgentId, task: TaskId) -> bool {
        let Some(slot) = self.existing_slot(agent) else {
            return false;
        };
        let mut held = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if *held != Some(task) {
            return false;
        }
        *held = None;
        trace!(agent_id = %agent, task_id = %task, "assignment slot released");
        true
    }

    fn active_task(&self, agent: AgentId) -> Option<TaskId> {
        let slot = self.existing_slot(agent)?;
        let held = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *held
    }

    fn active_count(&self) -> usize {
        let slots: Vec<Slot> = {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            slots.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }
}
