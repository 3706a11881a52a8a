//! GRBL status report mapping
//!
//! Extracts the machine state from a realtime status report such as
//! `<Hold:0|MPos:0.000,0.000,0.000|FS:0,0>` and maps it onto [`ActiveState`].

use cncflow_core::ActiveState;

/// Status report parsing
pub struct StatusParser;

impl StatusParser {
    /// Parse machine state from status report
    /// Extracts state from format: <Idle|...> or <Run|...>
    pub fn parse_machine_state(status_line: &str) -> Option<&str> {
        let start = status_line.find('<')?;
        let body = &status_line[start + 1..];
        let end = body.find(['|', '>'])?;
        let state = body[..end].trim();
        if state.is_empty() {
            None
        } else {
            Some(state)
        }
    }

    /// Map a status report onto the active state
    ///
    /// Returns `None` when the line is not a status report.
    pub fn parse_active_state(status_line: &str) -> Option<ActiveState> {
        Self::parse_machine_state(status_line).map(active_state_from_name)
    }
}

/// Map a GRBL state name (with optional `:sub` code) onto [`ActiveState`]
///
/// Unrecognised names become `Unknown`, which never enables an action.
pub fn active_state_from_name(name: &str) -> ActiveState {
    match name {
        s if s.starts_with("Idle") => ActiveState::Idle,
        s if s.starts_with("Run") => ActiveState::Run,
        s if s.starts_with("Hold") => ActiveState::Hold,
        s if s.starts_with("Alarm") => ActiveState::Alarm,
        s if s.starts_with("Home") => ActiveState::Home,
        s if s.starts_with("Jog") => ActiveState::Jog,
        s if s.starts_with("Door") => ActiveState::Door,
        s if s.starts_with("Check") => ActiveState::Check,
        s if s.starts_with("Sleep") => ActiveState::Sleep,
        unknown => {
            tracing::warn!("Unknown GRBL state '{}', treating as Unknown", unknown);
            ActiveState::Unknown
        }
    }
}
