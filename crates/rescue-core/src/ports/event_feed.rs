//! EventFeed port - 受理済み遷移の追記専用ログ
//!
//! Observers (stats, history, notifications) read it; only the registry
//! appends to it.

use tokio::sync::broadcast;

use crate::domain::{FeedOffset, PendingEvent, TransitionEvent};

/// EventFeed はドメインイベントを記録
///
/// # 保証
/// - append-only, offsets are dense and start at 0
/// - per task, feed order equals version order
pub trait EventFeed: Send + Sync {
    /// Assign the next offset and store the event.
    fn append(&self, event: PendingEvent) -> TransitionEvent;

    fn get(&self, offset: FeedOffset) -> Option<TransitionEvent>;

    /// Number of events recorded so far (the next offset).
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live notifications for events appended after this call.
    fn subscribe(&self) -> broadcast::Receiver<TransitionEvent>;
}

/// Lazy, finite read over a feed starting at an offset.
///
/// The end is fixed when the cursor is created; events appended afterwards
/// are picked up by a new cursor from `next_offset()`.
pub struct FeedCursor<'a> {
    feed: &'a dyn EventFeed,
    next: FeedOffset,
    end: FeedOffset,
}

impl<'a> FeedCursor<'a> {
    pub fn new(feed: &'a dyn EventFeed, from: FeedOffset) -> Self {
        let end = feed.len();
        Self {
            feed,
            next: from.min(end),
            end,
        }
    }

    /// Where a follow-up cursor should resume.
    pub fn next_offset(&self) -> FeedOffset {
        self.next
    }
}

impl Iterator for FeedCursor<'_> {
    type Item = TransitionEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let event = self.feed.get(self.next)?;
        self.next += 1;
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.end - self.next) as usize;
        (left, Some(left))
    }
}
