//! Line-oriented console for driving a session by hand
//!
//! Each input line is either a telemetry edit applied to the published
//! [`MachineSnapshot`], a job-control action, or a simulated bus event.

use std::fmt;
use std::path::PathBuf;

use cncflow_communication::active_state_from_name;
use cncflow_core::{ActiveState, MachineSnapshot, WorkflowState};

/// Parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Change telemetry
    Telemetry(TelemetryEdit),
    /// Read a program from disk and publish it as loaded
    Load(PathBuf),
    /// Job-control action
    Action(ConsoleAction),
    /// Pretend the sender paused on M6
    ToolChange(String),
    /// Pretend the upload pipeline failed
    UploadFailed(String),
    /// Print recorded bus events, or clear them
    History { clear: bool },
    /// Print the current state
    Status,
    /// Print usage
    Help,
    /// Leave the console
    Quit,
}

/// Snapshot edits
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEdit {
    Connected(bool),
    ActiveState(ActiveState),
    WorkflowState(WorkflowState),
    Received(u64),
    Finished(u64),
    Hold(bool),
    LaserMode(bool),
    Unload,
}

impl TelemetryEdit {
    /// Apply the edit in place
    pub fn apply(&self, snapshot: &mut MachineSnapshot) {
        match self {
            Self::Connected(connected) => snapshot.connected = *connected,
            Self::ActiveState(state) => snapshot.active_state = *state,
            Self::WorkflowState(state) => snapshot.workflow_state = *state,
            Self::Received(received) => snapshot.sender.received = *received,
            Self::Finished(time) => snapshot.sender.finish_time = *time,
            Self::Hold(hold) => {
                snapshot.sender.hold = *hold;
                snapshot.sender.hold_reason = hold.then(|| "M6".to_string());
            }
            Self::LaserMode(laser) => snapshot.laser_mode = *laser,
            Self::Unload => snapshot.file = Default::default(),
        }
    }
}

/// Actions routed to the session
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Run,
    Pause,
    Stop,
    TestRun,
    Outline,
    OpenStartFromLine,
    SetStartLine(String),
    StartFromLine,
    CancelStartFromLine,
    Upload(Option<String>),
    LoadRecent(Option<String>),
    RequestClose,
    ConfirmClose,
    CancelClose,
}

/// Console parse failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
telemetry: connect | disconnect | state <grbl-state> | workflow idle|running|paused
           received <n> | finish <ms> | hold on|off | laser on|off | load <path> | unload
actions:   run | pause | stop | test | outline | upload [name] | recent [name]
           sfl | line <n> | go | cancel | close | confirm | keep
events:    toolchange <comment> | upload-failed <reason>
other:     status | history [clear] | help | quit";

fn on_off(value: Option<&str>) -> Result<bool, ParseError> {
    match value {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(ParseError("expected on|off".to_string())),
    }
}

fn number(value: Option<&str>, what: &str) -> Result<u64, ParseError> {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| ParseError(format!("expected {}", what)))
}

fn optional(rest: &str) -> Option<String> {
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Parse a console line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let arg = rest.split_whitespace().next();

    use ConsoleAction as A;
    use ConsoleCommand as C;
    use TelemetryEdit as T;

    let command = match word.to_ascii_lowercase().as_str() {
        "connect" => C::Telemetry(T::Connected(true)),
        "disconnect" => C::Telemetry(T::Connected(false)),
        "state" => {
            let name = arg.ok_or_else(|| ParseError("expected a state name".to_string()))?;
            C::Telemetry(T::ActiveState(active_state_from_name(name)))
        }
        "workflow" => C::Telemetry(T::WorkflowState(match arg {
            Some("idle") => WorkflowState::Idle,
            Some("running") => WorkflowState::Running,
            Some("paused") => WorkflowState::Paused,
            _ => return Err(ParseError("expected idle|running|paused".to_string())),
        })),
        "received" => C::Telemetry(T::Received(number(arg, "a line count")?)),
        "finish" => C::Telemetry(T::Finished(number(arg, "a timestamp")?)),
        "hold" => C::Telemetry(T::Hold(on_off(arg)?)),
        "laser" => C::Telemetry(T::LaserMode(on_off(arg)?)),
        "unload" => C::Telemetry(T::Unload),
        "load" => match optional(rest) {
            Some(path) => C::Load(PathBuf::from(path)),
            None => return Err(ParseError("expected a path".to_string())),
        },
        "run" => C::Action(A::Run),
        "pause" => C::Action(A::Pause),
        "stop" => C::Action(A::Stop),
        "test" => C::Action(A::TestRun),
        "outline" => C::Action(A::Outline),
        "sfl" => C::Action(A::OpenStartFromLine),
        "line" => match optional(rest) {
            Some(value) => C::Action(A::SetStartLine(value)),
            None => return Err(ParseError("expected a line number".to_string())),
        },
        "go" => C::Action(A::StartFromLine),
        "cancel" => C::Action(A::CancelStartFromLine),
        "upload" => C::Action(A::Upload(optional(rest))),
        "recent" => C::Action(A::LoadRecent(optional(rest))),
        "close" => C::Action(A::RequestClose),
        "confirm" => C::Action(A::ConfirmClose),
        "keep" => C::Action(A::CancelClose),
        "toolchange" => C::ToolChange(rest.trim().to_string()),
        "upload-failed" => C::UploadFailed(
            optional(rest).unwrap_or_else(|| "upload rejected".to_string()),
        ),
        "history" => match arg {
            None => C::History { clear: false },
            Some("clear") => C::History { clear: true },
            Some(_) => return Err(ParseError("expected history [clear]".to_string())),
        },
        "status" => C::Status,
        "help" | "?" => C::Help,
        "quit" | "exit" => C::Quit,
        other => return Err(ParseError(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}
