use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{WidgetCommand, WidgetEvent};

/// Broadcast event stream type used by UI subscribers.
pub type EventStream = broadcast::Receiver<WidgetEvent>;

/// Errors returned by widget channel operations.
#[derive(Debug, Error)]
pub enum WidgetChannelError {
    /// The command receiver side is closed.
    #[error("command channel is closed")]
    CommandChannelClosed,
}

/// Command/event channel pair shared by the runtime and UI shells.
///
/// Events are broadcast: every widget instance embedded on a page subscribes
/// independently, so handlers must tolerate seeing the same event more than
/// once across instances.
#[derive(Clone, Debug)]
pub struct WidgetChannels {
    command_tx: mpsc::Sender<WidgetCommand>,
    event_tx: broadcast::Sender<WidgetEvent>,
}

impl WidgetChannels {
    /// Create a new channel set and return it with the command receiver.
    pub fn new(
        command_buffer: usize,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<WidgetCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));

        (
            Self {
                command_tx,
                event_tx,
            },
            command_rx,
        )
    }

    /// Clone the command sender.
    pub fn command_sender(&self) -> mpsc::Sender<WidgetCommand> {
        self.command_tx.clone()
    }

    /// Clone the event sender.
    pub fn event_sender(&self) -> broadcast::Sender<WidgetEvent> {
        self.event_tx.clone()
    }

    /// Subscribe to emitted widget events.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Send one command to the runtime.
    pub async fn send_command(&self, command: WidgetCommand) -> Result<(), WidgetChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| WidgetChannelError::CommandChannelClosed)
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: WidgetEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FacingMode;

    #[tokio::test]
    async fn sends_commands_to_receiver() {
        let (channels, mut rx) = WidgetChannels::new(8, 8);
        channels
            .send_command(WidgetCommand::StartCamera {
                facing: FacingMode::User,
            })
            .await
            .expect("command send should work");

        let cmd = rx.recv().await.expect("receiver should have a command");
        match cmd {
            WidgetCommand::StartCamera { facing } => assert_eq!(facing, FacingMode::User),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fans_out_events_to_subscribers() {
        let (channels, _) = WidgetChannels::new(4, 16);
        let mut a = channels.subscribe();
        let mut b = channels.subscribe();

        channels.emit(WidgetEvent::ControlsEnabled { enabled: false });

        let event_a = a.recv().await.expect("subscriber a should receive event");
        let event_b = b.recv().await.expect("subscriber b should receive event");
        assert_eq!(event_a, event_b);
    }
}
