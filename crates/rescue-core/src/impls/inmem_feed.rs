//! InMemoryEventFeed - 開発用のイベントフィード
//!
//! Vec-backed log plus a broadcast channel for live observers.

use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::domain::{FeedOffset, PendingEvent, TransitionEvent};
use crate::ports::EventFeed;

pub struct InMemoryEventFeed {
    events: RwLock<Vec<TransitionEvent>>,
    tx: broadcast::Sender<TransitionEvent>,
}

impl InMemoryEventFeed {
    /// `capacity` bounds how far a live subscriber may lag before it starts
    /// missing notifications; the log itself keeps everything.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            events: RwLock::new(Vec::new()),
            tx,
        }
    }
}

impl EventFeed for InMemoryEventFeed {
    fn append(&self, event: PendingEvent) -> TransitionEvent {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let event = event.at_offset(events.len() as FeedOffset);
        events.push(event.clone());
        // sent under the write lock so subscribers see offsets in log order;
        // ok if nobody is listening
        let _ = self.tx.send(event.clone());
        event
    }

    fn get(&self, offset: FeedOffset) -> Option<TransitionEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.get(offset as usize).cloned()
    }

    fn len(&self) -> u64 {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.len() as u64
    }

    fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.tx.subscribe()
    }
}
