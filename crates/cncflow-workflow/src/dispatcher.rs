//! Command dispatcher
//!
//! Turns a permitted operator action into controller commands. Every call
//! re-evaluates [`AllowedActions`] against the snapshot it is given, so a
//! stale button press becomes [`ActionOutcome::NotPermitted`] instead of a
//! command. [`RunIntent`] is only touched once the controller handle has
//! accepted the command.

use std::fmt;
use std::sync::Arc;

use cncflow_communication::{ControllerCommand, ControllerHandle};
use cncflow_core::{ActiveState, ControllerError, MachineSnapshot, ToolChangeContext, WorkflowState};

use crate::allowed::{compute_allowed, AllowedActions};
use crate::intent::{clamp_line, RunIntent};

/// Operator actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Upload a program
    Upload,
    /// Close the loaded program
    Close,
    /// Request an outline
    Outline,
    /// Check-mode dry run
    TestRun,
    /// Start or resume
    Run,
    /// Start at the staged line
    StartFromLine,
    /// Feed hold
    Pause,
    /// Abort
    Stop,
}

impl Action {
    /// Whether `allowed` permits this action
    ///
    /// Outline and test run are additionally withheld while a started job
    /// is paused.
    pub fn permitted_by(&self, allowed: &AllowedActions) -> bool {
        match self {
            Action::Upload => allowed.can_upload,
            Action::Close => allowed.can_close,
            Action::Outline => allowed.can_outline && allowed.idle_controls_visible(),
            Action::TestRun => allowed.can_test_run && allowed.idle_controls_visible(),
            Action::Run => allowed.can_run,
            Action::StartFromLine => allowed.can_start_from_line,
            Action::Pause => allowed.can_pause,
            Action::Stop => allowed.can_stop,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Upload => "upload",
            Action::Close => "close",
            Action::Outline => "outline",
            Action::TestRun => "test-run",
            Action::Run => "run",
            Action::StartFromLine => "start-from-line",
            Action::Pause => "pause",
            Action::Stop => "stop",
        };
        write!(f, "{}", name)
    }
}

/// Result of an operator action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Commands were handed to the controller
    Dispatched,
    /// The action is not available in the current state
    NotPermitted(Action),
}

impl ActionOutcome {
    /// True when commands went out
    pub fn is_dispatched(&self) -> bool {
        matches!(self, ActionOutcome::Dispatched)
    }
}

/// Result type for dispatcher calls; `Err` means the controller link failed
pub type DispatchResult = Result<ActionOutcome, ControllerError>;

/// Sends commands for permitted actions
#[derive(Clone)]
pub struct CommandDispatcher {
    controller: Arc<dyn ControllerHandle>,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Create a dispatcher over a controller handle
    pub fn new(controller: Arc<dyn ControllerHandle>) -> Self {
        Self { controller }
    }

    /// Check `action` against the current state
    pub fn check(
        &self,
        action: Action,
        snapshot: &MachineSnapshot,
        intent: &RunIntent,
    ) -> Option<ActionOutcome> {
        let allowed = compute_allowed(snapshot, intent);
        if action.permitted_by(&allowed) {
            None
        } else {
            tracing::warn!(
                "Refused {} (active={}, workflow={}, connected={}, file_loaded={})",
                action,
                snapshot.active_state,
                snapshot.workflow_state,
                snapshot.connected,
                snapshot.file.loaded
            );
            Some(ActionOutcome::NotPermitted(action))
        }
    }

    fn send(&self, command: ControllerCommand) -> Result<(), ControllerError> {
        tracing::info!("Sending {}", command);
        self.controller.dispatch(command)
    }

    /// Start or resume the job
    ///
    /// Check mode resumes the check run; a paused sender or held machine is
    /// released; anything else begins the program.
    pub fn run(&self, snapshot: &MachineSnapshot, intent: &mut RunIntent) -> DispatchResult {
        if let Some(refused) = self.check(Action::Run, snapshot, intent) {
            return Ok(refused);
        }

        if snapshot.active_state == ActiveState::Check {
            self.send(ControllerCommand::ResumeProgram)?;
            intent.test_started = true;
        } else if snapshot.workflow_state == WorkflowState::Paused
            || snapshot.active_state == ActiveState::Hold
        {
            self.send(ControllerCommand::ResumeFromHold)?;
        } else {
            self.send(ControllerCommand::BeginProgram)?;
        }
        intent.run_has_started = true;
        Ok(ActionOutcome::Dispatched)
    }

    /// Start at the staged line, clamped into the program
    pub fn start_from_line(
        &self,
        snapshot: &MachineSnapshot,
        intent: &mut RunIntent,
    ) -> DispatchResult {
        if let Some(refused) = self.check(Action::StartFromLine, snapshot, intent) {
            return Ok(refused);
        }

        let line = clamp_line(intent.start_from_line.value, snapshot.file.line_total);
        self.send(ControllerCommand::StartAtLine {
            line,
            z_max: snapshot.file.z_max,
        })?;
        intent.start_from_line.value = line;
        intent.start_from_line.close();
        intent.run_has_started = true;
        Ok(ActionOutcome::Dispatched)
    }

    /// Abort the job and remember where it stopped
    pub fn stop(&self, snapshot: &MachineSnapshot, intent: &mut RunIntent) -> DispatchResult {
        if let Some(refused) = self.check(Action::Stop, snapshot, intent) {
            return Ok(refused);
        }

        self.send(ControllerCommand::Stop)?;
        intent.run_has_started = false;
        intent
            .start_from_line
            .stage_clamped(snapshot.sender.received, snapshot.file.line_total);

        if snapshot.active_state == ActiveState::Check {
            self.send(ControllerCommand::CancelCheckMode)?;
        }
        Ok(ActionOutcome::Dispatched)
    }

    /// Feed hold
    pub fn pause(&self, snapshot: &MachineSnapshot, intent: &RunIntent) -> DispatchResult {
        if let Some(refused) = self.check(Action::Pause, snapshot, intent) {
            return Ok(refused);
        }
        self.send(ControllerCommand::Pause)?;
        Ok(ActionOutcome::Dispatched)
    }

    /// Dry-run the program in check mode
    pub fn test_run(&self, snapshot: &MachineSnapshot, intent: &mut RunIntent) -> DispatchResult {
        if let Some(refused) = self.check(Action::TestRun, snapshot, intent) {
            return Ok(refused);
        }
        self.send(ControllerCommand::RunCheckMode)?;
        intent.run_has_started = true;
        Ok(ActionOutcome::Dispatched)
    }

    /// Hand the tool-change context over ahead of an upload
    pub fn prepare_upload(
        &self,
        snapshot: &MachineSnapshot,
        intent: &RunIntent,
        context: &ToolChangeContext,
    ) -> DispatchResult {
        if let Some(refused) = self.check(Action::Upload, snapshot, intent) {
            return Ok(refused);
        }
        self.send(ControllerCommand::ToolChangeContext(context.clone()))?;
        Ok(ActionOutcome::Dispatched)
    }

    /// Unload the program and forget any run state tied to it
    pub fn close(&self, snapshot: &MachineSnapshot, intent: &mut RunIntent) -> DispatchResult {
        if let Some(refused) = self.check(Action::Close, snapshot, intent) {
            return Ok(refused);
        }
        self.send(ControllerCommand::UnloadProgram)?;
        *intent = RunIntent::default();
        Ok(ActionOutcome::Dispatched)
    }
}
