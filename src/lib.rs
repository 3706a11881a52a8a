//! # cncflow
//!
//! Job control for CNC G-code senders driving GRBL and compatible controllers:
//! - Run, pause, resume and stop with permissions derived from live telemetry
//! - Check-mode test runs and start-from-line with Z safety
//! - Background outline tracing of the loaded program
//! - Tool-change awareness during upload and execution
//!
//! ## Architecture
//!
//! cncflow is organized as a workspace with multiple crates:
//!
//! 1. **cncflow-core** - Snapshot types, errors, event bus
//! 2. **cncflow-communication** - Controller command set, status parsing
//! 3. **cncflow-workflow** - Allowed-action derivation, dispatch, session
//! 4. **cncflow-settings** - Configuration files and validation
//! 5. **cncflow** - Console host that integrates all crates

pub mod console;
pub mod outline;

pub use cncflow_communication::{ChannelController, ControllerCommand, ControllerHandle};
pub use cncflow_core::{
    event_bus, init_event_bus, ActiveState, AppEvent, Error, EventBus, FileInfo,
    MachineSnapshot, NotificationEvent, NotificationLevel, Result, WorkflowState,
};
pub use cncflow_settings::{Config, LoggingSettings, SettingsError};
pub use cncflow_workflow::{
    compute_allowed, ActionOutcome, AllowedActions, RunIntent, SessionOptions, WorkflowSession,
};
pub use outline::BoundingBoxOutline;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging from the logging settings
///
/// `RUST_LOG` overrides the configured level. Output goes to stderr so the
/// console prompt on stdout stays readable.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    if settings.json {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Session options for a loaded configuration
pub fn session_options(config: &Config) -> SessionOptions {
    SessionOptions {
        tool_change: config.tool_change.to_context(),
        laser_on_outline: config.outline.laser_on_outline,
        outline_timeout: config.outline.timeout(),
    }
}

/// Publish `event`, logging when nobody observed it
///
/// Returns whether a subscriber or receiver saw the event.
pub fn publish_event(bus: &EventBus, event: AppEvent) -> bool {
    match bus.publish(event) {
        Ok(_) => true,
        Err(e) => {
            tracing::trace!("Event not delivered: {}", e);
            false
        }
    }
}

/// Recorded bus events, oldest first
///
/// Empty unless `events.enable_history` is set.
pub fn history_lines(bus: &EventBus) -> Vec<String> {
    bus.history(None)
        .iter()
        .map(|event| format!("[{:?}] {}", event.category(), event.description()))
        .collect()
}

/// One-line summary of the session state
pub fn status_line(session: &WorkflowSession) -> String {
    let snapshot = session.snapshot();
    let allowed = session.allowed();
    let mut enabled = Vec::new();
    for (flag, name) in [
        (allowed.can_run, allowed.run_label()),
        (allowed.can_pause, "Pause"),
        (allowed.can_stop, "Stop"),
        (allowed.can_test_run, "Test Run"),
        (allowed.can_outline, "Outline"),
        (allowed.can_start_from_line, "Start From Line"),
        (allowed.can_upload, "Upload"),
        (allowed.can_close, "Close"),
    ] {
        if flag {
            enabled.push(name);
        }
    }

    let file = if snapshot.file.loaded {
        format!("{} ({} lines)", snapshot.file.name, snapshot.file.line_total)
    } else {
        "no file".to_string()
    };

    format!(
        "{} | {} / {} | {} | received {} | enabled: [{}]",
        if snapshot.connected { "connected" } else { "disconnected" },
        snapshot.active_state,
        snapshot.workflow_state,
        file,
        snapshot.sender.received,
        enabled.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncflow_core::event_bus::ToolChangeEvent;
    use cncflow_core::ToolChangeOption;

    #[test]
    fn test_history_lines_follow_config() {
        let mut config = Config::new();
        let quiet = EventBus::with_config(config.events.to_bus_config());
        quiet
            .publish(AppEvent::ToolChange(ToolChangeEvent::Paused {
                comment: "T1".to_string(),
            }))
            .ok();
        assert!(history_lines(&quiet).is_empty());

        config.events.enable_history = true;
        config.events.max_history_size = 2;
        let bus = EventBus::with_config(config.events.to_bus_config());
        for comment in ["T1", "T2", "T3"] {
            bus.publish(AppEvent::ToolChange(ToolChangeEvent::Paused {
                comment: comment.to_string(),
            }))
            .ok();
        }
        let lines = history_lines(&bus);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with("[ToolChange]")));
    }

    #[test]
    fn test_publish_event_reports_delivery() {
        let bus = EventBus::new();
        let event = || {
            AppEvent::ToolChange(ToolChangeEvent::Paused {
                comment: "T4".to_string(),
            })
        };
        assert!(!publish_event(&bus, event()));

        let _rx = bus.receiver();
        assert!(publish_event(&bus, event()));
    }

    #[test]
    fn test_session_options_follow_config() {
        let mut config = Config::new();
        config.tool_change.option = ToolChangeOption::Manual;
        config.outline.laser_on_outline = true;
        config.outline.timeout_ms = Some(2500);

        let options = session_options(&config);
        assert_eq!(options.tool_change.option, ToolChangeOption::Manual);
        assert!(options.laser_on_outline);
        assert_eq!(
            options.outline_timeout,
            Some(std::time::Duration::from_millis(2500))
        );
    }
}
