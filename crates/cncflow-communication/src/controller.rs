//! Controller command channel
//!
//! The job-control core never waits on the controller. Commands are queued
//! on a bounded channel and the sender's IO loop drains them.

use cncflow_core::ControllerError;
use tokio::sync::mpsc;

use crate::command::ControllerCommand;

/// Handle through which commands reach the external controller
///
/// `dispatch` must not block. `Ok` means the command was accepted for
/// delivery, not that the machine executed it.
pub trait ControllerHandle: Send + Sync {
    /// Queue a command for the controller
    fn dispatch(&self, command: ControllerCommand) -> Result<(), ControllerError>;
}

/// Controller handle backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelController {
    command_tx: mpsc::Sender<ControllerCommand>,
}

impl ChannelController {
    /// Create a handle and the receiving end for the IO loop
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ControllerCommand>) {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
        (Self { command_tx }, command_rx)
    }

    /// True while the receiving end is alive
    pub fn is_connected(&self) -> bool {
        !self.command_tx.is_closed()
    }
}

impl ControllerHandle for ChannelController {
    fn dispatch(&self, command: ControllerCommand) -> Result<(), ControllerError> {
        let name = command.name();
        match self.command_tx.try_send(command) {
            Ok(()) => {
                tracing::debug!("Queued controller command {}", name);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::error!("Controller command queue full, dropped {}", name);
                Err(ControllerError::BufferOverflow {
                    message: format!("command queue full, {} not sent", name),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("Controller IO loop gone, dropped {}", name);
                Err(ControllerError::NotConnected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_reaches_receiver() {
        let (controller, mut rx) = ChannelController::new(4);
        controller
            .dispatch(ControllerCommand::Pause)
            .expect("queue has room");
        assert_eq!(rx.recv().await, Some(ControllerCommand::Pause));
    }

    #[test]
    fn test_full_queue_is_buffer_overflow() {
        let (controller, _rx) = ChannelController::new(1);
        controller.dispatch(ControllerCommand::Pause).expect("first fits");
        let err = controller
            .dispatch(ControllerCommand::Stop)
            .expect_err("second overflows");
        assert!(matches!(err, ControllerError::BufferOverflow { .. }));
    }

    #[test]
    fn test_closed_receiver_is_not_connected() {
        let (controller, rx) = ChannelController::new(4);
        drop(rx);
        assert!(!controller.is_connected());
        assert_eq!(
            controller.dispatch(ControllerCommand::Stop),
            Err(ControllerError::NotConnected)
        );
    }
}
