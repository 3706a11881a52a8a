//! Operator-facing status text

use cncflow_core::{FileError, NotificationEvent, NotificationLevel};

pub(crate) fn start_from_line() -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Success,
        message: "Running Start From Specific Line Command".to_string(),
        duration_ms: Some(2000),
    }
}

pub(crate) fn generating_outline() -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Info,
        message: "Generating outline for current file".to_string(),
        duration_ms: None,
    }
}

pub(crate) fn outline_failed(reason: &str) -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Danger,
        message: format!("Unable to generate outline: {}", reason),
        duration_ms: None,
    }
}

pub(crate) fn tool_change_pause(comment: &str) -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Warning,
        message: format!(
            "Program execution paused due to M6 command with the following comment: {}",
            comment
        ),
        duration_ms: None,
    }
}

pub(crate) fn missing_recent_file() -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Danger,
        message: "Unable to load file - file may have been moved or renamed.".to_string(),
        duration_ms: None,
    }
}

pub(crate) fn finished_checking(file_name: &str) -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Info,
        message: format!("Finished Checking {}!", file_name),
        duration_ms: None,
    }
}

pub(crate) fn upload_failed(error: &FileError) -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Danger,
        message: error.to_string(),
        duration_ms: None,
    }
}

pub(crate) fn command_failed(command: &str, reason: &str) -> NotificationEvent {
    NotificationEvent {
        level: NotificationLevel::Danger,
        message: format!("Unable to send {} to the controller: {}", command, reason),
        duration_ms: None,
    }
}
