//! Job-control permissions
//!
//! A pure function of the latest [`MachineSnapshot`] and the session's
//! [`RunIntent`]. Nothing here is cached; callers recompute after every
//! change.
//!
//! Active state outranks workflow state: a machine in Hold or Jog can always
//! be resumed. When the two sources disagree the more restrictive answer
//! wins, and an `Unknown` active state never enables running.

use cncflow_core::{ActiveState, MachineSnapshot, WorkflowState};
use serde::Serialize;

use crate::intent::RunIntent;

/// Actions currently available to the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllowedActions {
    /// Upload a new program
    pub can_upload: bool,
    /// Close the loaded program
    pub can_close: bool,
    /// Request an outline of the loaded program
    pub can_outline: bool,
    /// Dry-run in check mode
    pub can_test_run: bool,
    /// Start or resume the job
    pub can_run: bool,
    /// Feed hold
    pub can_pause: bool,
    /// Abort the job
    pub can_stop: bool,
    /// Start from a specific line
    pub can_start_from_line: bool,
    /// A started job is paused or holding
    pub workflow_paused: bool,
}

impl AllowedActions {
    /// Label for the run control
    pub fn run_label(&self) -> &'static str {
        if self.workflow_paused {
            "Resume Job"
        } else {
            "Start Job"
        }
    }

    /// Outline and test run are only offered while nothing is in flight
    pub fn idle_controls_visible(&self) -> bool {
        !self.workflow_paused
    }
}

/// Whether the run/resume control is enabled
///
/// First matching rule wins.
pub fn can_run(snapshot: &MachineSnapshot) -> bool {
    if !snapshot.connected || !snapshot.file.loaded {
        return false;
    }
    if snapshot.active_state.is_intervention() {
        return true;
    }
    if !matches!(
        snapshot.workflow_state,
        WorkflowState::Idle | WorkflowState::Paused
    ) {
        return false;
    }
    if snapshot.active_state == ActiveState::Check {
        return matches!(
            snapshot.workflow_state,
            WorkflowState::Paused | WorkflowState::Idle
        );
    }
    matches!(
        snapshot.active_state,
        ActiveState::Idle | ActiveState::Hold | ActiveState::Check
    )
}

/// A started job is paused, holding for a tool change, or in feed hold
pub fn workflow_paused(snapshot: &MachineSnapshot, intent: &RunIntent) -> bool {
    intent.run_has_started
        && (snapshot.workflow_state == WorkflowState::Paused
            || snapshot.sender.hold
            || snapshot.active_state == ActiveState::Hold)
}

/// Derive every permission from the snapshot and intent
pub fn compute_allowed(snapshot: &MachineSnapshot, intent: &RunIntent) -> AllowedActions {
    let is_ready = snapshot.connected && snapshot.file.loaded;
    let run = can_run(snapshot);
    let paused = workflow_paused(snapshot, intent);
    let workflow = snapshot.workflow_state;

    AllowedActions {
        can_upload: workflow == WorkflowState::Idle,
        can_close: workflow == WorkflowState::Idle && snapshot.file.loaded,
        can_outline: run,
        can_test_run: run,
        can_run: run,
        can_pause: is_ready
            && workflow == WorkflowState::Running
            && snapshot.active_state != ActiveState::Hold,
        can_stop: is_ready
            && matches!(workflow, WorkflowState::Running | WorkflowState::Paused),
        can_start_from_line: run && !paused,
        workflow_paused: paused,
    }
}
