//! Live-session account handoff: detect a rate limit in the child's output,
//! switch to a backup profile, log in again and keep going.

mod controller;
mod session;
mod state;
mod traits;

pub use controller::{HandoffConfig, HandoffController, HandoffDeps};
pub use session::{read_last, write_last, Outcome, SessionRecord};
pub use state::HandoffState;
pub use traits::{LoginHandler, Notifier, NotifyAction, NotifyLevel, PtyController};
