//! Data models for the machine state snapshot
//!
//! This module provides:
//! - Active (controller-reported) machine states
//! - Workflow (sender bookkeeping) states
//! - Sender progress counters
//! - Loaded program metadata
//! - The immutable snapshot the job-control state machine reads
//! - The tool-change context sent ahead of uploads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Machine state as reported by the physical controller right now
///
/// Mirrors the GRBL status report states. `Unknown` covers anything the
/// telemetry layer could not map, and is never treated as permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActiveState {
    /// Connected and idle, ready for commands
    Idle,
    /// Executing motion
    Run,
    /// Feed hold, awaiting resume
    Hold,
    /// Manual jog/movement mode
    Jog,
    /// Machine alarm state (requires manual intervention)
    Alarm,
    /// Check mode (dry-run without machine movement)
    Check,
    /// Safety door interlock triggered
    Door,
    /// Homing cycle in progress
    Home,
    /// Low-power sleep state
    Sleep,
    /// Not reported yet or not recognised
    #[default]
    Unknown,
}

impl ActiveState {
    /// Operator is mid-intervention; resuming is always legal from here
    pub fn is_intervention(&self) -> bool {
        matches!(self, ActiveState::Hold | ActiveState::Jog)
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Run => write!(f, "Run"),
            Self::Hold => write!(f, "Hold"),
            Self::Jog => write!(f, "Jog"),
            Self::Alarm => write!(f, "Alarm"),
            Self::Check => write!(f, "Check"),
            Self::Door => write!(f, "Door"),
            Self::Home => write!(f, "Home"),
            Self::Sleep => write!(f, "Sleep"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Sender's own bookkeeping of job progress
///
/// May lag [`ActiveState`] during hold/resume transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowState {
    /// No job streaming
    #[default]
    Idle,
    /// Streaming a program
    Running,
    /// Streaming suspended
    Paused,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

/// Sender progress counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderStatus {
    /// Lines written to the controller
    pub sent: u64,
    /// Lines acknowledged by the controller
    pub received: u64,
    /// Sender is holding (e.g. waiting on a tool change)
    pub hold: bool,
    /// Why the sender is holding, if it said (e.g. "M6")
    pub hold_reason: Option<String>,
    /// Completion timestamp in milliseconds since the epoch, 0 while unfinished
    pub finish_time: u64,
}

impl SenderStatus {
    /// True once the sender reported a completion time
    pub fn is_finished(&self) -> bool {
        self.finish_time != 0
    }
}

/// Metadata of the loaded program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Whether a program is loaded
    pub loaded: bool,
    /// Display name of the program
    pub name: String,
    /// Full program text
    pub program: Arc<str>,
    /// Total line count
    pub line_total: u64,
    /// Bounding box maximum Z
    pub z_max: f64,
}

impl FileInfo {
    /// Create metadata for a loaded program
    pub fn loaded(name: impl Into<String>, program: impl Into<Arc<str>>, z_max: f64) -> Self {
        let program: Arc<str> = program.into();
        let line_total = program.lines().count() as u64;
        Self {
            loaded: true,
            name: name.into(),
            program,
            line_total,
            z_max,
        }
    }
}

impl Default for FileInfo {
    fn default() -> Self {
        Self {
            loaded: false,
            name: String::new(),
            program: Arc::from(""),
            line_total: 0,
            z_max: 0.0,
        }
    }
}

/// Immutable view of the machine, sender and file state
///
/// Owned by the telemetry layer; the job-control core only reads it.
/// Supports builder pattern for flexible construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Connection to the controller is up
    pub connected: bool,
    /// Controller-reported state
    pub active_state: ActiveState,
    /// Sender bookkeeping state
    pub workflow_state: WorkflowState,
    /// Sender progress counters
    pub sender: SenderStatus,
    /// Loaded program metadata
    pub file: FileInfo,
    /// Spindle is in laser mode
    pub laser_mode: bool,
}

impl MachineSnapshot {
    /// Create a disconnected snapshot with nothing loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set connection status
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    /// Builder method to set the active state
    pub fn with_active_state(mut self, state: ActiveState) -> Self {
        self.active_state = state;
        self
    }

    /// Builder method to set the workflow state
    pub fn with_workflow_state(mut self, state: WorkflowState) -> Self {
        self.workflow_state = state;
        self
    }

    /// Builder method to set sender counters
    pub fn with_sender(mut self, sender: SenderStatus) -> Self {
        self.sender = sender;
        self
    }

    /// Builder method to set the received line counter
    pub fn with_received(mut self, received: u64) -> Self {
        self.sender.received = received;
        self
    }

    /// Builder method to set the sender hold flag
    pub fn with_sender_hold(mut self, hold: bool) -> Self {
        self.sender.hold = hold;
        self
    }

    /// Builder method to set the completion timestamp
    pub fn with_finish_time(mut self, finish_time: u64) -> Self {
        self.sender.finish_time = finish_time;
        self
    }

    /// Builder method to set the loaded file
    pub fn with_file(mut self, file: FileInfo) -> Self {
        self.file = file;
        self
    }

    /// Builder method to set laser mode
    pub fn with_laser_mode(mut self, laser_mode: bool) -> Self {
        self.laser_mode = laser_mode;
        self
    }

    /// Shorthand for `file.loaded`
    pub fn file_loaded(&self) -> bool {
        self.file.loaded
    }

    /// Connected with a program loaded
    pub fn is_ready(&self) -> bool {
        self.connected && self.file.loaded
    }
}

/// Strategy for M6 tool-change commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolChangeOption {
    /// Skip M6 entirely
    #[default]
    Ignore,
    /// Pause and let the operator swap the tool
    Manual,
    /// Run the configured before/after code
    Code,
    /// Run a stored macro
    Macro,
}

impl fmt::Display for ToolChangeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => write!(f, "Ignore"),
            Self::Manual => write!(f, "Manual"),
            Self::Code => write!(f, "Code"),
            Self::Macro => write!(f, "Macro"),
        }
    }
}

/// Tool-change context handed to the controller before a program is uploaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChangeContext {
    /// Selected strategy
    pub option: ToolChangeOption,
    /// G-code run before the change
    pub pre_hook: String,
    /// G-code run after the change
    pub post_hook: String,
    /// Macro identifier when `option` is `Macro`
    pub macro_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_info_counts_lines() {
        let file = FileInfo::loaded("part.nc", "G21\nG90\nG0 X1\n", 5.0);
        assert!(file.loaded);
        assert_eq!(file.line_total, 3);
        assert_eq!(file.z_max, 5.0);
    }

    #[test]
    fn test_default_snapshot_is_restrictive() {
        let snapshot = MachineSnapshot::new();
        assert!(!snapshot.connected);
        assert!(!snapshot.file_loaded());
        assert_eq!(snapshot.active_state, ActiveState::Unknown);
        assert_eq!(snapshot.workflow_state, WorkflowState::Idle);
        assert!(!snapshot.is_ready());
    }

    #[test]
    fn test_snapshot_builder() {
        let snapshot = MachineSnapshot::new()
            .with_connected(true)
            .with_active_state(ActiveState::Hold)
            .with_workflow_state(WorkflowState::Running)
            .with_received(42)
            .with_sender_hold(true)
            .with_file(FileInfo::loaded("a.nc", "G0 X0", 1.0));

        assert!(snapshot.is_ready());
        assert_eq!(snapshot.sender.received, 42);
        assert!(snapshot.sender.hold);
        assert!(!snapshot.sender.is_finished());
    }

    #[test]
    fn test_active_state_helpers() {
        assert!(ActiveState::Hold.is_intervention());
        assert!(ActiveState::Jog.is_intervention());
        assert!(!ActiveState::Check.is_intervention());
        assert_eq!(ActiveState::Check.to_string(), "Check");
    }
}
