//! # cncflow Core
//!
//! Core types shared by every cncflow crate.
//! Provides the machine state snapshot consumed by the job-control state
//! machine, the layered error types, and the application event bus.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{
    ActiveState, FileInfo, MachineSnapshot, SenderStatus, ToolChangeContext, ToolChangeOption,
    WorkflowState,
};

pub use error::{ControllerError, Error, FileError, OutlineError, Result};

// Re-export event bus for convenience
pub use event_bus::{
    event_bus, init_event_bus, AppEvent, EventBus, EventBusConfig, EventBusError, EventCategory,
    EventFilter, NotificationEvent, NotificationLevel, ScopedSubscription, SubscriptionId,
};
