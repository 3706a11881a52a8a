use std::sync::Arc;

use cncflow::console::{parse_line, ConsoleAction, ConsoleCommand};
use cncflow::outline::program_z_max;
use cncflow::{
    session_options, status_line, BoundingBoxOutline, ChannelController, Config,
    ControllerCommand, FileInfo, MachineSnapshot, WorkflowSession,
};
use cncflow_core::EventBus;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

struct Console {
    session: WorkflowSession,
    snapshot_tx: watch::Sender<MachineSnapshot>,
    commands: mpsc::Receiver<ControllerCommand>,
}

impl Console {
    fn new(config: &Config) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(MachineSnapshot::new());
        let (controller, commands) = ChannelController::new(config.controller.command_capacity);
        let mut session = WorkflowSession::new(
            snapshot_rx,
            Arc::new(controller),
            Arc::new(BoundingBoxOutline),
            EventBus::new(),
            session_options(config),
        );
        session.activate();
        Self {
            session,
            snapshot_tx,
            commands,
        }
    }

    fn feed(&mut self, line: &str) {
        match parse_line(line).expect("valid line").expect("not blank") {
            ConsoleCommand::Telemetry(edit) => {
                self.snapshot_tx.send_modify(|snapshot| edit.apply(snapshot));
            }
            ConsoleCommand::Action(ConsoleAction::Run) => {
                self.session.run().expect("run");
            }
            ConsoleCommand::Action(ConsoleAction::Pause) => {
                self.session.pause().expect("pause");
            }
            ConsoleCommand::Action(ConsoleAction::Stop) => {
                self.session.stop().expect("stop");
            }
            ConsoleCommand::Action(ConsoleAction::OpenStartFromLine) => {
                assert!(self.session.open_start_from_line());
            }
            ConsoleCommand::Action(ConsoleAction::SetStartLine(value)) => {
                assert!(self.session.set_start_line_input(&value));
            }
            ConsoleCommand::Action(ConsoleAction::StartFromLine) => {
                self.session.start_from_line().expect("start from line");
            }
            other => panic!("not scripted: {:?}", other),
        }
    }

    fn load(&mut self, program: &str) {
        let file = FileInfo::loaded("job.nc", program, program_z_max(program));
        self.snapshot_tx.send_modify(|snapshot| snapshot.file = file);
    }

    fn sent(&mut self) -> Vec<ControllerCommand> {
        let mut out = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            out.push(command);
        }
        out
    }
}

const PROGRAM: &str = "G21 G90\nG0 Z12.5\nG0 X0 Y0\nG1 Z-1 F200\nG1 X30\nG1 Y30\nG1 X0\nG1 Y0\nG0 Z12.5\n";

#[tokio::test]
async fn scripted_run_pause_resume_stop() {
    let mut console = Console::new(&Config::default());
    console.load(PROGRAM);
    for line in ["connect", "state Idle", "run"] {
        console.feed(line);
    }
    assert_eq!(console.sent(), vec![ControllerCommand::BeginProgram]);

    for line in ["workflow running", "state Run", "pause", "state Hold:0", "workflow paused"] {
        console.feed(line);
    }
    assert_eq!(console.sent(), vec![ControllerCommand::Pause]);
    console.session.sync_snapshot();
    assert!(status_line(&console.session).contains("Resume Job"));

    console.feed("run");
    assert_eq!(console.sent(), vec![ControllerCommand::ResumeFromHold]);

    for line in ["workflow running", "state Run", "received 5", "stop"] {
        console.feed(line);
    }
    assert_eq!(console.sent(), vec![ControllerCommand::Stop]);
    assert_eq!(console.session.intent().start_from_line.value, 5);
    assert!(!console.session.intent().run_has_started);
}

#[tokio::test]
async fn start_from_line_uses_program_height() {
    let mut console = Console::new(&Config::default());
    console.load(PROGRAM);
    for line in ["connect", "state Idle", "sfl", "line 4.2", "go"] {
        console.feed(line);
    }
    assert_eq!(
        console.sent(),
        vec![ControllerCommand::StartAtLine {
            line: 5,
            z_max: 12.5
        }]
    );
}

#[tokio::test]
async fn config_file_drives_upload_context() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[tool_change]\noption = \"Code\"\npre_hook = \"G53 G0 Z0\"\n\n[controller]\ncommand_capacity = 8\n",
    )
    .expect("write config");
    let config = Config::load_from_file(&path).expect("config");

    let mut console = Console::new(&config);
    console.feed("connect");
    console
        .session
        .request_upload(Some("part.nc".to_string()))
        .expect("upload");

    match console.sent().as_slice() {
        [ControllerCommand::ToolChangeContext(ctx)] => {
            assert_eq!(ctx.pre_hook, "G53 G0 Z0");
            assert_eq!(ctx.option, cncflow_core::ToolChangeOption::Code);
        }
        other => panic!("unexpected {:?}", other),
    }
}
