//! # cncflow Workflow
//!
//! Run/pause/stop/resume job control.
//!
//! - [`allowed`]: which actions the current snapshot permits
//! - [`intent`]: operator intent kept across snapshots
//! - [`dispatcher`]: commands issued for a permitted action
//! - [`outline`]: background outline requests
//! - [`session`]: folds snapshots, bus notifications and actions together

pub mod allowed;
pub mod dispatcher;
pub mod intent;
mod notify;
pub mod outline;
pub mod session;

pub use allowed::{can_run, compute_allowed, workflow_paused, AllowedActions};
pub use dispatcher::{Action, ActionOutcome, CommandDispatcher, DispatchResult};
pub use intent::{clamp_line, RunIntent, StartFromLine};
pub use outline::{OutlineBackend, OutlineChannel, OutlineRequest};
pub use session::{SessionEvent, SessionInput, SessionOptions, WorkflowSession};
