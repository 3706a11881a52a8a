//! Job-control session
//!
//! Owns the [`RunIntent`] for the loaded program and folds three input
//! streams into it:
//!
//! - machine snapshots from a `watch` channel owned by the telemetry layer
//! - bus notifications (tool-change pause, outline result, upload failure),
//!   queued through a single-writer inbox
//! - operator actions, called directly
//!
//! All of it happens on the task that owns the session, so the intent never
//! has concurrent writers. Permissions are recomputed from the latest
//! snapshot before every action.

use std::sync::Arc;
use std::time::Duration;

use cncflow_communication::ControllerHandle;
use cncflow_core::event_bus::{
    ConnectionEvent, ErrorEvent, FileEvent, MachineEvent, OutlineEvent, ToolChangeEvent,
};
use cncflow_core::{
    ActiveState, AppEvent, ControllerError, EventBus, EventCategory, EventFilter, FileError,
    MachineSnapshot, NotificationEvent, ScopedSubscription, ToolChangeContext,
};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::allowed::{compute_allowed, AllowedActions};
use crate::dispatcher::{Action, ActionOutcome, CommandDispatcher, DispatchResult};
use crate::intent::RunIntent;
use crate::notify;
use crate::outline::{OutlineBackend, OutlineChannel};

/// Session settings taken from the application config
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Sent to the controller ahead of every upload
    pub tool_change: ToolChangeContext,
    /// Request laser outlines when the spindle is in laser mode
    pub laser_on_outline: bool,
    /// Give up on an outline after this long
    pub outline_timeout: Option<Duration>,
}

/// Bus notification queued for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Sender paused on M6
    ToolChangePaused {
        /// Comment on the M6 line
        comment: String,
    },
    /// Outline finished
    OutlineCompleted {
        /// Request identifier
        request_id: Uuid,
    },
    /// Outline failed or timed out
    OutlineFailed {
        /// Request identifier
        request_id: Uuid,
        /// Failure reason
        reason: String,
    },
    /// External uploader failed
    UploadFailed {
        /// Program name
        name: String,
        /// Failure reason
        reason: String,
    },
}

impl SessionEvent {
    fn from_app_event(event: AppEvent) -> Option<Self> {
        match event {
            AppEvent::ToolChange(ToolChangeEvent::Paused { comment }) => {
                Some(Self::ToolChangePaused { comment })
            }
            AppEvent::Outline(OutlineEvent::Completed { request_id, .. }) => {
                Some(Self::OutlineCompleted { request_id })
            }
            AppEvent::Outline(OutlineEvent::Failed { request_id, reason }) => {
                Some(Self::OutlineFailed { request_id, reason })
            }
            AppEvent::File(FileEvent::UploadFailed { name, reason }) => {
                Some(Self::UploadFailed { name, reason })
            }
            _ => None,
        }
    }
}

/// Something the session should fold next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// The snapshot channel has a newer value
    Snapshot,
    /// A queued bus notification
    Event(SessionEvent),
}

/// Job-control state for one loaded-program view
pub struct WorkflowSession {
    snapshot_rx: watch::Receiver<MachineSnapshot>,
    snapshot: MachineSnapshot,
    intent: RunIntent,
    close_pending: bool,
    dispatcher: CommandDispatcher,
    outline: OutlineChannel,
    bus: EventBus,
    options: SessionOptions,
    inbox_tx: mpsc::UnboundedSender<SessionEvent>,
    inbox_rx: mpsc::UnboundedReceiver<SessionEvent>,
    subscriptions: Vec<ScopedSubscription>,
}

impl std::fmt::Debug for WorkflowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowSession")
            .field("intent", &self.intent)
            .field("active", &self.is_active())
            .field("outline", &self.outline)
            .finish()
    }
}

impl WorkflowSession {
    /// Create an inactive session reading snapshots from `snapshot_rx`
    pub fn new(
        snapshot_rx: watch::Receiver<MachineSnapshot>,
        controller: Arc<dyn ControllerHandle>,
        outline_backend: Arc<dyn OutlineBackend>,
        bus: EventBus,
        options: SessionOptions,
    ) -> Self {
        let mut snapshot_rx = snapshot_rx;
        let snapshot = snapshot_rx.borrow_and_update().clone();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let outline = OutlineChannel::new(outline_backend, bus.clone(), options.outline_timeout);

        Self {
            snapshot_rx,
            snapshot,
            intent: RunIntent::default(),
            close_pending: false,
            dispatcher: CommandDispatcher::new(controller),
            outline,
            bus,
            options,
            inbox_tx,
            inbox_rx,
            subscriptions: Vec::new(),
        }
    }

    /// Register bus subscriptions
    ///
    /// Calling it on an active session does nothing.
    pub fn activate(&mut self) {
        if self.is_active() {
            return;
        }
        let categories = [
            EventCategory::ToolChange,
            EventCategory::Outline,
            EventCategory::File,
        ];
        for category in categories {
            let inbox = self.inbox_tx.clone();
            let guard = self.bus.subscribe_scoped(
                EventFilter::Categories(vec![category]),
                move |event| {
                    if let Some(event) = SessionEvent::from_app_event(event) {
                        // Receiver lives as long as the session
                        let _ = inbox.send(event);
                    }
                },
            );
            self.subscriptions.push(guard);
        }
        tracing::debug!(
            "Workflow session active with {} subscriptions",
            self.subscriptions.len()
        );
    }

    /// Release subscriptions and abort pending outlines
    pub fn deactivate(&mut self) {
        self.subscriptions.clear();
        let aborted = self.outline.abort_all();
        tracing::debug!(
            "Workflow session inactive, {} outline(s) aborted",
            aborted
        );
    }

    /// Whether bus subscriptions are registered
    pub fn is_active(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Last folded snapshot
    pub fn snapshot(&self) -> &MachineSnapshot {
        &self.snapshot
    }

    /// Current run intent
    pub fn intent(&self) -> &RunIntent {
        &self.intent
    }

    /// Permissions for the last folded snapshot
    pub fn allowed(&self) -> AllowedActions {
        compute_allowed(&self.snapshot, &self.intent)
    }

    /// A close confirmation is outstanding
    pub fn close_pending(&self) -> bool {
        self.close_pending
    }

    /// Outline computations not yet torn down
    pub fn pending_outlines(&self) -> usize {
        self.outline.pending_count()
    }

    /// Start-from-line prompt body
    pub fn start_from_line_prompt(&self) -> String {
        self.intent
            .start_from_line
            .prompt_text(self.snapshot.file.line_total)
    }

    /// Wait for the next input to fold
    ///
    /// Returns `None` once the snapshot source has gone away.
    pub async fn next_input(&mut self) -> Option<SessionInput> {
        tokio::select! {
            changed = self.snapshot_rx.changed() => changed.ok().map(|_| SessionInput::Snapshot),
            Some(event) = self.inbox_rx.recv() => Some(SessionInput::Event(event)),
        }
    }

    /// Fold one input
    pub fn apply(&mut self, input: SessionInput) {
        match input {
            // `changed()` already marked the value seen
            SessionInput::Snapshot => {
                let next = self.snapshot_rx.borrow_and_update().clone();
                self.fold_snapshot(next);
            }
            SessionInput::Event(event) => self.handle_event(event),
        }
    }

    /// Fold every queued bus notification
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbox_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Fold the newest snapshot if the channel has one
    pub fn sync_snapshot(&mut self) -> bool {
        if !self.snapshot_rx.has_changed().unwrap_or(false) {
            return false;
        }
        let next = self.snapshot_rx.borrow_and_update().clone();
        self.fold_snapshot(next);
        true
    }

    /// Apply the intent resets implied by moving to `next`
    pub fn fold_snapshot(&mut self, next: MachineSnapshot) {
        let prev = std::mem::replace(&mut self.snapshot, next);
        let next = &self.snapshot;

        if prev.connected != next.connected {
            self.publish(AppEvent::Connection(ConnectionEvent::StateChanged {
                connected: next.connected,
            }));
        }
        if prev.active_state != next.active_state {
            self.publish(AppEvent::Machine(MachineEvent::ActiveStateChanged {
                from: prev.active_state,
                to: next.active_state,
            }));
        }
        if prev.workflow_state != next.workflow_state {
            self.publish(AppEvent::Machine(MachineEvent::WorkflowStateChanged {
                from: prev.workflow_state,
                to: next.workflow_state,
            }));
        }

        let left_check =
            prev.active_state == ActiveState::Check && next.active_state != ActiveState::Check;
        let program_changed = *prev.file.program != *next.file.program;

        if left_check || program_changed {
            self.intent.run_has_started = false;
        }
        if left_check && self.intent.test_started {
            self.intent.test_started = false;
            let name = self.snapshot.file.name.clone();
            self.notify(notify::finished_checking(&name));
        }
        if program_changed {
            let line_total = self.snapshot.file.line_total;
            let staged = self.intent.start_from_line.value;
            self.intent
                .start_from_line
                .stage_clamped(staged, line_total);
            if self.snapshot.file.loaded {
                let event = FileEvent::Loaded {
                    name: self.snapshot.file.name.clone(),
                    lines: line_total,
                };
                self.publish(AppEvent::File(event));
            }
        }
        if !prev.sender.is_finished() && self.snapshot.sender.is_finished() {
            self.intent.start_from_line.reset();
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ToolChangePaused { comment } => {
                tracing::info!("Tool change pause: {}", comment);
                self.notify(notify::tool_change_pause(&comment));
            }
            SessionEvent::OutlineCompleted { request_id } => {
                if !self.outline.teardown(request_id) {
                    tracing::debug!("Outline {} already torn down", request_id);
                }
            }
            SessionEvent::OutlineFailed { request_id, reason } => {
                if self.outline.teardown(request_id) {
                    self.notify(notify::outline_failed(&reason));
                }
            }
            SessionEvent::UploadFailed { name, reason } => {
                let error = FileError::UploadFailed { name, reason };
                tracing::error!("{}", error);
                self.notify(notify::upload_failed(&error));
            }
        }
    }

    /// Start or resume the job
    pub fn run(&mut self) -> DispatchResult {
        self.sync_snapshot();
        let result = self.dispatcher.run(&self.snapshot, &mut self.intent);
        self.surface("run", result)
    }

    /// Open the start-from-line prompt
    pub fn open_start_from_line(&mut self) -> bool {
        self.sync_snapshot();
        if !self.allowed().can_start_from_line {
            tracing::warn!("Start from line not available");
            return false;
        }
        self.intent.start_from_line.open(
            self.snapshot.sender.received,
            self.snapshot.file.line_total,
        );
        true
    }

    /// Close the prompt without dispatching
    pub fn cancel_start_from_line(&mut self) {
        self.intent.start_from_line.close();
    }

    /// Stage a start line; out-of-range values are ignored
    pub fn set_start_line(&mut self, line: u64) -> bool {
        self.sync_snapshot();
        self.intent
            .start_from_line
            .set(line, self.snapshot.file.line_total)
    }

    /// Stage a start line typed by the operator
    pub fn set_start_line_input(&mut self, input: &str) -> bool {
        self.sync_snapshot();
        self.intent
            .start_from_line
            .set_from_input(input, self.snapshot.file.line_total)
    }

    /// Start at the staged line
    pub fn start_from_line(&mut self) -> DispatchResult {
        self.sync_snapshot();
        let result = self
            .dispatcher
            .start_from_line(&self.snapshot, &mut self.intent);
        if matches!(result, Ok(ActionOutcome::Dispatched)) {
            self.notify(notify::start_from_line());
        }
        self.surface("start-from-line", result)
    }

    /// Stop the job
    pub fn stop(&mut self) -> DispatchResult {
        self.sync_snapshot();
        let result = self.dispatcher.stop(&self.snapshot, &mut self.intent);
        self.surface("stop", result)
    }

    /// Feed hold
    pub fn pause(&mut self) -> DispatchResult {
        self.sync_snapshot();
        let result = self.dispatcher.pause(&self.snapshot, &self.intent);
        self.surface("pause", result)
    }

    /// Dry-run in check mode
    pub fn test_run(&mut self) -> DispatchResult {
        self.sync_snapshot();
        let result = self.dispatcher.test_run(&self.snapshot, &mut self.intent);
        self.surface("test-run", result)
    }

    /// Request an outline of the loaded program
    ///
    /// Must be called from within a tokio runtime.
    pub fn outline(&mut self) -> ActionOutcome {
        self.sync_snapshot();
        if let Some(refused) = self
            .dispatcher
            .check(Action::Outline, &self.snapshot, &self.intent)
        {
            return refused;
        }
        let laser_mode = self.options.laser_on_outline && self.snapshot.laser_mode;
        let id = self
            .outline
            .request(Arc::clone(&self.snapshot.file.program), laser_mode);
        tracing::info!("Outline {} requested (laser={})", id, laser_mode);
        self.notify(notify::generating_outline());
        ActionOutcome::Dispatched
    }

    /// Send the tool-change context and ask the uploader for a program
    pub fn request_upload(&mut self, name: Option<String>) -> DispatchResult {
        self.sync_snapshot();
        let result =
            self.dispatcher
                .prepare_upload(&self.snapshot, &self.intent, &self.options.tool_change);
        if matches!(result, Ok(ActionOutcome::Dispatched)) {
            self.publish(AppEvent::File(FileEvent::UploadRequested { name }));
        }
        self.surface("tool-change-context", result)
    }

    /// Reload a recent file; `None` means its data is gone
    pub fn load_recent_file(&mut self, name: Option<String>) -> cncflow_core::Result<ActionOutcome> {
        match name {
            Some(name) => Ok(self.request_upload(Some(name))?),
            None => {
                tracing::warn!("Recent file no longer available");
                self.notify(notify::missing_recent_file());
                Err(FileError::MissingRecentFile.into())
            }
        }
    }

    /// Ask to close the loaded program
    pub fn request_close(&mut self) -> bool {
        self.sync_snapshot();
        self.close_pending = self.allowed().can_close;
        self.close_pending
    }

    /// Withdraw a close request
    pub fn cancel_close(&mut self) {
        self.close_pending = false;
    }

    /// Confirm a close request and unload the program
    pub fn confirm_close(&mut self) -> DispatchResult {
        if !std::mem::take(&mut self.close_pending) {
            return Ok(ActionOutcome::NotPermitted(Action::Close));
        }
        self.sync_snapshot();
        let result = self.dispatcher.close(&self.snapshot, &mut self.intent);
        if matches!(result, Ok(ActionOutcome::Dispatched)) {
            self.publish(AppEvent::File(FileEvent::Closed));
        }
        self.surface("unload-program", result)
    }

    fn surface(&self, command: &str, result: DispatchResult) -> DispatchResult {
        if let Err(e) = &result {
            tracing::error!("Failed to send {}: {}", command, e);
            self.publish(AppEvent::Error(ErrorEvent::Error {
                code: "controller".to_string(),
                message: e.to_string(),
                recoverable: !matches!(e, ControllerError::NotConnected),
            }));
            self.notify(notify::command_failed(command, &e.to_string()));
        }
        result
    }

    fn notify(&self, notification: NotificationEvent) {
        self.publish(AppEvent::Notification(notification));
    }

    fn publish(&self, event: AppEvent) {
        if let Err(e) = self.bus.publish(event) {
            tracing::trace!("Event not observed: {}", e);
        }
    }
}
