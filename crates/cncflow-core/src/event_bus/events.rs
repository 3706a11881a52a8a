//! Event type definitions for the event bus.
//!
//! This module defines all application events organized by category.
//! Events are designed to be cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::data::{ActiveState, WorkflowState};

/// Root event enum for all application events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Machine connection events
    Connection(ConnectionEvent),
    /// Machine state transitions
    Machine(MachineEvent),
    /// Program file operations
    File(FileEvent),
    /// Tool-change notifications from the sender
    ToolChange(ToolChangeEvent),
    /// Outline request lifecycle
    Outline(OutlineEvent),
    /// Operator-facing status text
    Notification(NotificationEvent),
    /// Error and diagnostic events
    Error(ErrorEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Connection(_) => EventCategory::Connection,
            AppEvent::Machine(_) => EventCategory::Machine,
            AppEvent::File(_) => EventCategory::File,
            AppEvent::ToolChange(_) => EventCategory::ToolChange,
            AppEvent::Outline(_) => EventCategory::Outline,
            AppEvent::Notification(_) => EventCategory::Notification,
            AppEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Connection(e) => e.description(),
            AppEvent::Machine(e) => e.description(),
            AppEvent::File(e) => e.description(),
            AppEvent::ToolChange(e) => e.description(),
            AppEvent::Outline(e) => e.description(),
            AppEvent::Notification(e) => e.description(),
            AppEvent::Error(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Machine connection events.
    Connection,
    /// Machine state transition events.
    Machine,
    /// Program file events.
    File,
    /// Tool-change events.
    ToolChange,
    /// Outline request events.
    Outline,
    /// Operator notifications.
    Notification,
    /// Error and diagnostic events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Connection => write!(f, "Connection"),
            EventCategory::Machine => write!(f, "Machine"),
            EventCategory::File => write!(f, "File"),
            EventCategory::ToolChange => write!(f, "ToolChange"),
            EventCategory::Outline => write!(f, "Outline"),
            EventCategory::Notification => write!(f, "Notification"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Connection-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Connection state changed.
    StateChanged {
        /// Whether the controller is currently connected.
        connected: bool,
    },
}

impl ConnectionEvent {
    fn description(&self) -> String {
        match self {
            ConnectionEvent::StateChanged { connected } => {
                format!(
                    "Connection state: {}",
                    if *connected {
                        "connected"
                    } else {
                        "disconnected"
                    }
                )
            }
        }
    }
}

/// Machine state transitions observed in the snapshot stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MachineEvent {
    /// Controller-reported state changed.
    ActiveStateChanged {
        /// Previous state.
        from: ActiveState,
        /// New state.
        to: ActiveState,
    },
    /// Sender workflow state changed.
    WorkflowStateChanged {
        /// Previous state.
        from: WorkflowState,
        /// New state.
        to: WorkflowState,
    },
}

impl MachineEvent {
    fn description(&self) -> String {
        match self {
            MachineEvent::ActiveStateChanged { from, to } => {
                format!("Active state: {} -> {}", from, to)
            }
            MachineEvent::WorkflowStateChanged { from, to } => {
                format!("Workflow state: {} -> {}", from, to)
            }
        }
    }
}

/// Program file events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileEvent {
    /// Operator asked for a program to be uploaded.
    UploadRequested {
        /// Name of the program, when already known.
        name: Option<String>,
    },
    /// A new program became the loaded program.
    Loaded {
        /// Program name.
        name: String,
        /// Total number of lines.
        lines: u64,
    },
    /// The external uploader failed.
    UploadFailed {
        /// Program name.
        name: String,
        /// Failure reason.
        reason: String,
    },
    /// Loaded program was unloaded.
    Closed,
}

impl FileEvent {
    fn description(&self) -> String {
        match self {
            FileEvent::UploadRequested { name: Some(name) } => {
                format!("Upload requested: {}", name)
            }
            FileEvent::UploadRequested { name: None } => "Upload requested".to_string(),
            FileEvent::Loaded { name, lines } => format!("Loaded: {} ({} lines)", name, lines),
            FileEvent::UploadFailed { name, reason } => {
                format!("Upload of {} failed: {}", name, reason)
            }
            FileEvent::Closed => "File closed".to_string(),
        }
    }
}

/// Tool-change notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolChangeEvent {
    /// Sender paused on an M6 command.
    Paused {
        /// Comment attached to the M6 line.
        comment: String,
    },
}

impl ToolChangeEvent {
    fn description(&self) -> String {
        match self {
            ToolChangeEvent::Paused { comment } => format!("Tool change pause: {}", comment),
        }
    }
}

/// Outline request lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutlineEvent {
    /// Request handed to the background computation.
    Requested {
        /// Request identifier.
        request_id: Uuid,
    },
    /// Outline produced.
    Completed {
        /// Request identifier.
        request_id: Uuid,
        /// Outline program text.
        outline: Arc<str>,
    },
    /// Outline computation failed or timed out.
    Failed {
        /// Request identifier.
        request_id: Uuid,
        /// Failure reason.
        reason: String,
    },
}

impl OutlineEvent {
    /// Request this event belongs to
    pub fn request_id(&self) -> Uuid {
        match self {
            OutlineEvent::Requested { request_id }
            | OutlineEvent::Completed { request_id, .. }
            | OutlineEvent::Failed { request_id, .. } => *request_id,
        }
    }

    fn description(&self) -> String {
        match self {
            OutlineEvent::Requested { request_id } => format!("Outline requested: {}", request_id),
            OutlineEvent::Completed {
                request_id,
                outline,
            } => format!(
                "Outline {} completed ({} lines)",
                request_id,
                outline.lines().count()
            ),
            OutlineEvent::Failed { request_id, reason } => {
                format!("Outline {} failed: {}", request_id, reason)
            }
        }
    }
}

/// Notification levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Neutral information.
    Info,
    /// Action accepted.
    Success,
    /// Operator attention needed.
    Warning,
    /// Action failed.
    Danger,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Success => write!(f, "success"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Danger => write!(f, "danger"),
        }
    }
}

/// Operator-facing status text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Notification level.
    pub level: NotificationLevel,
    /// Message text.
    pub message: String,
    /// Display duration in milliseconds, `None` until closed.
    pub duration_ms: Option<u64>,
}

impl NotificationEvent {
    fn description(&self) -> String {
        format!("[{}] {}", self.level, self.message)
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical warning that does not block operation.
    Warning,
    /// Error that may be recoverable.
    Error,
    /// Critical error requiring immediate attention.
    Critical,
}

/// Error and diagnostic events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ErrorEvent {
    /// Warning (non-blocking).
    Warning {
        /// Warning code identifier.
        code: String,
        /// Human-readable warning message.
        message: String,
    },
    /// Error (may be recoverable).
    Error {
        /// Error code identifier.
        code: String,
        /// Human-readable error message.
        message: String,
        /// Whether recovery is possible without user intervention.
        recoverable: bool,
    },
    /// Critical error (requires attention).
    Critical {
        /// Critical error code identifier.
        code: String,
        /// Human-readable critical error message.
        message: String,
    },
}

impl ErrorEvent {
    fn description(&self) -> String {
        match self {
            ErrorEvent::Warning { code, message } => {
                format!("Warning [{}]: {}", code, message)
            }
            ErrorEvent::Error { code, message, .. } => {
                format!("Error [{}]: {}", code, message)
            }
            ErrorEvent::Critical { code, message } => {
                format!("Critical [{}]: {}", code, message)
            }
        }
    }

    /// Get the severity of this error event
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorEvent::Warning { .. } => ErrorSeverity::Warning,
            ErrorEvent::Error { .. } => ErrorSeverity::Error,
            ErrorEvent::Critical { .. } => ErrorSeverity::Critical,
        }
    }
}
