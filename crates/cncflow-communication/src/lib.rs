//! # cncflow Communication
//!
//! The link between the job-control core and the external controller:
//! the semantic command set, the non-blocking command channel and the
//! mapping of GRBL status reports onto [`cncflow_core::ActiveState`].

pub mod command;
pub mod controller;
pub mod status;

pub use command::ControllerCommand;
pub use controller::{ChannelController, ControllerHandle};
pub use status::{active_state_from_name, StatusParser};
