//! Semantic controller commands
//!
//! These are the only commands the job-control layer ever issues. How each
//! one is realised on the wire belongs to the sender behind the channel.

use cncflow_core::ToolChangeContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A command for the external controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ControllerCommand {
    /// Start streaming the loaded program from the top
    BeginProgram,
    /// Continue a program that was started in check mode
    ResumeProgram,
    /// Release a feed hold or paused sender
    ResumeFromHold,
    /// Dry-run the loaded program in check mode
    RunCheckMode,
    /// Leave check mode
    CancelCheckMode,
    /// Start streaming at a given line, replaying prior modal state
    StartAtLine {
        /// 1-based line to start at
        line: u64,
        /// Bounding box maximum Z of the program
        z_max: f64,
    },
    /// Feed hold
    Pause,
    /// Abort the running program
    Stop,
    /// Tool-change handling to apply to the next program
    ToolChangeContext(ToolChangeContext),
    /// Drop the loaded program
    UnloadProgram,
}

impl ControllerCommand {
    /// Stable name used in logs and the console host
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginProgram => "begin-program",
            Self::ResumeProgram => "resume-program",
            Self::ResumeFromHold => "resume-from-hold",
            Self::RunCheckMode => "run-check-mode",
            Self::CancelCheckMode => "cancel-check-mode",
            Self::StartAtLine { .. } => "start-at-line",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::ToolChangeContext(_) => "tool-change-context",
            Self::UnloadProgram => "unload-program",
        }
    }
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartAtLine { line, z_max } => {
                write!(f, "{}(line={}, z_max={})", self.name(), line, z_max)
            }
            Self::ToolChangeContext(ctx) => write!(f, "{}({})", self.name(), ctx.option),
            other => write!(f, "{}()", other.name()),
        }
    }
}
