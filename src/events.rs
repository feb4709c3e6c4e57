//! Event path from the UDP listeners into shared state and the hub

use std::sync::Arc;

use crate::hub::Hub;
use crate::protocol::ServerMessage;
use crate::recordings::TransferEvent;
use crate::state::BridgeState;

#[derive(Clone)]
pub struct EventPublisher {
    state: Arc<BridgeState>,
    hub: Arc<Hub>,
}

impl EventPublisher {
    pub fn new(state: Arc<BridgeState>, hub: Arc<Hub>) -> Self {
        Self { state, hub }
    }

    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// Broadcast an alarm only on an actual transition
    pub fn distress(&self, active: bool) {
        if self.state.set_distress(active) {
            tracing::info!("Distress {}", if active { "active" } else { "cleared" });
            self.hub.broadcast(&ServerMessage::Alarm { active });
        }
    }

    /// Free status text from the device
    pub fn status(&self, text: &str) {
        self.state.record_message(text);
        self.hub.broadcast(&ServerMessage::Msg(text.to_string()));
    }

    pub fn transfer(&self, event: TransferEvent) {
        match event {
            TransferEvent::Started { name, total_chunks } => {
                self.hub.broadcast(&ServerMessage::FileStart { name, total_chunks });
            }
            TransferEvent::Progress { name, received, total_chunks } => {
                self.hub.broadcast(&ServerMessage::FileProgress { name, received, total_chunks });
            }
            TransferEvent::Completed { name, recording } => {
                self.state
                    .set_last_received(recording.path.display().to_string(), recording.id.clone());
                self.hub.broadcast(&ServerMessage::FileEnd { name, id: recording.id });
                self.hub.broadcast_recordings();
            }
        }
    }
}
