use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cncflow::console::{self, ConsoleAction, ConsoleCommand};
use cncflow::outline::program_z_max;
use cncflow::{
    history_lines, init_event_bus, init_logging, publish_event, session_options, status_line,
    BoundingBoxOutline, ChannelController, Config, FileInfo, MachineSnapshot, WorkflowSession,
};
use cncflow_core::event_bus::{FileEvent, ToolChangeEvent};
use cncflow_core::AppEvent;
use cncflow_workflow::{ActionOutcome, DispatchResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_logging(&config.logging)?;
    tracing::info!(
        "cncflow {} (built {})",
        cncflow::VERSION,
        cncflow::BUILD_DATE
    );

    if init_event_bus(config.events.to_bus_config()).is_err() {
        tracing::warn!("Event bus already initialized; keeping existing configuration");
    }
    let bus = cncflow::event_bus().clone();

    let (snapshot_tx, snapshot_rx) = watch::channel(MachineSnapshot::new());
    let (controller, mut commands) = ChannelController::new(config.controller.command_capacity);

    // Stand-in for the controller IO loop
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            tracing::info!("controller <- {}", command);
        }
    });

    let notifications = bus.receiver();
    tokio::spawn(print_notifications(notifications));

    let mut session = WorkflowSession::new(
        snapshot_rx,
        Arc::new(controller),
        Arc::new(BoundingBoxOutline),
        bus.clone(),
        session_options(&config),
    );
    session.activate();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", console::HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        handle_command(command, &mut session, &snapshot_tx, &bus).await;
                    }
                    Err(e) => println!("{}", e),
                }
            }
            input = session.next_input() => {
                match input {
                    Some(input) => session.apply(input),
                    None => break,
                }
            }
        }
    }

    session.deactivate();
    tracing::info!("Session closed");
    Ok(())
}

async fn handle_command(
    command: ConsoleCommand,
    session: &mut WorkflowSession,
    snapshot_tx: &watch::Sender<MachineSnapshot>,
    bus: &cncflow::EventBus,
) {
    match command {
        ConsoleCommand::Telemetry(edit) => {
            snapshot_tx.send_modify(|snapshot| edit.apply(snapshot));
        }
        ConsoleCommand::Load(path) => match tokio::fs::read_to_string(&path).await {
            Ok(program) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let z_max = program_z_max(&program);
                let file = FileInfo::loaded(name, program, z_max);
                snapshot_tx.send_modify(|snapshot| snapshot.file = file);
            }
            Err(e) => {
                publish_event(
                    bus,
                    AppEvent::File(FileEvent::UploadFailed {
                        name: path.display().to_string(),
                        reason: e.to_string(),
                    }),
                );
            }
        },
        ConsoleCommand::Action(action) => run_action(action, session),
        ConsoleCommand::ToolChange(comment) => {
            publish_event(bus, AppEvent::ToolChange(ToolChangeEvent::Paused { comment }));
        }
        ConsoleCommand::UploadFailed(reason) => {
            let name = session.snapshot().file.name.clone();
            publish_event(bus, AppEvent::File(FileEvent::UploadFailed { name, reason }));
        }
        ConsoleCommand::Status => {
            session.sync_snapshot();
            println!("{}", status_line(session));
        }
        ConsoleCommand::History { clear: true } => bus.clear_history(),
        ConsoleCommand::History { clear: false } => {
            for line in history_lines(bus) {
                println!("{}", line);
            }
        }
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
}

fn run_action(action: ConsoleAction, session: &mut WorkflowSession) {
    let result: DispatchResult = match action {
        ConsoleAction::Run => session.run(),
        ConsoleAction::Pause => session.pause(),
        ConsoleAction::Stop => session.stop(),
        ConsoleAction::TestRun => session.test_run(),
        ConsoleAction::Outline => Ok(session.outline()),
        ConsoleAction::OpenStartFromLine => {
            if session.open_start_from_line() {
                println!("{}", session.start_from_line_prompt());
            } else {
                println!("Start from line is not available");
            }
            return;
        }
        ConsoleAction::SetStartLine(value) => {
            if !session.set_start_line_input(&value) {
                println!("Rejected line '{}'", value);
            }
            return;
        }
        ConsoleAction::StartFromLine => session.start_from_line(),
        ConsoleAction::CancelStartFromLine => {
            session.cancel_start_from_line();
            return;
        }
        ConsoleAction::Upload(name) => session.request_upload(name),
        ConsoleAction::LoadRecent(name) => match session.load_recent_file(name) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                println!("{}", e);
                return;
            }
        },
        ConsoleAction::RequestClose => {
            if session.request_close() {
                println!("Close the current file? (confirm | keep)");
            }
            return;
        }
        ConsoleAction::ConfirmClose => session.confirm_close(),
        ConsoleAction::CancelClose => {
            session.cancel_close();
            return;
        }
    };

    match result {
        Ok(ActionOutcome::NotPermitted(action)) => println!("{} is not available", action),
        Ok(ActionOutcome::Dispatched) => {}
        Err(e) => println!("{}", e),
    }
}

async fn print_notifications(mut rx: broadcast::Receiver<AppEvent>) {
    loop {
        match rx.recv().await {
            Ok(AppEvent::Notification(n)) => println!("[{}] {}", n.level, n.message),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Notification printer lagged by {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
