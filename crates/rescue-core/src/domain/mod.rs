//! Domain model (IDs, task record, status machine, transitions, events).
//!
//! Nothing in here does I/O or locking; the registry and feed ports decide
//! where tasks and events live.

pub mod errors;
pub mod events;
pub mod expiry;
pub mod ids;
pub mod impact;
pub mod state;
pub mod task;
pub mod transition;

pub use self::errors::{ErrorKind, InvalidReason, RescueError};
pub use self::events::{FeedOffset, PendingEvent, TransitionEvent};
pub use self::expiry::{TimeLeft, remaining};
pub use self::ids::{AgentId, TaskId};
pub use self::impact::Impact;
pub use self::state::{Priority, TaskStatus};
pub use self::task::{Donation, DonationRequest, Task};
pub use self::transition::{EventKind, Transition};
