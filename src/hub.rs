//! Broadcast hub with owner/viewer arbitration
//!
//! Transport-agnostic: each connection is an outbound queue of text frames.
//! The first connection becomes owner; later ones are viewers. Control
//! commands are honored only from the owner. When the owner leaves, some
//! other open connection is promoted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::constants::CLIENT_QUEUE_LEN;
use crate::error::CommandError;
use crate::protocol::{ClientCommand, Role, ServerMessage};
use crate::recordings::RecordingRegistry;
use crate::state::BridgeState;

pub type ClientId = Uuid;

/// Outbound path for device commands
pub trait CommandDispatch: Send + Sync {
    fn dispatch(&self, payload: &str) -> Result<(), CommandError>;
}

struct Client {
    label: String,
    role: Role,
    tx: mpsc::Sender<String>,
}

impl Client {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, message: &ServerMessage) {
        // Slow clients lose messages rather than stall the hub
        if let Err(e) = self.tx.try_send(message.to_string()) {
            tracing::debug!("Dropping message for {}: {}", self.label, e);
        }
    }
}

#[derive(Default)]
struct Inner {
    clients: HashMap<ClientId, Client>,
    owner: Option<ClientId>,
}

impl Inner {
    fn broadcast(&self, message: &ServerMessage) {
        for client in self.clients.values().filter(|c| c.is_open()) {
            client.send(message);
        }
    }

    fn owner_label(&self) -> String {
        self.owner
            .and_then(|id| self.clients.get(&id))
            .map(|c| c.label.clone())
            .unwrap_or_else(|| "none".to_string())
    }

    fn broadcast_census(&self) {
        let census = format!("clients={}, owner={}", self.clients.len(), self.owner_label());
        self.broadcast(&ServerMessage::Msg(census));
    }
}

pub struct Hub {
    inner: Mutex<Inner>,
    registry: Arc<RecordingRegistry>,
    state: Arc<BridgeState>,
    commands: Arc<dyn CommandDispatch>,
}

impl Hub {
    pub fn new(
        registry: Arc<RecordingRegistry>,
        state: Arc<BridgeState>,
        commands: Arc<dyn CommandDispatch>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            registry,
            state,
            commands,
        }
    }

    /// Register a connection; its role and the recording list are queued immediately
    pub fn connect(&self, label: impl Into<String>) -> (ClientId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_LEN);
        let id = Uuid::new_v4();
        let label = label.into();

        let mut inner = self.inner.lock();
        let role = if inner.owner.is_none() {
            inner.owner = Some(id);
            Role::Owner
        } else {
            Role::Viewer
        };
        tracing::info!("Client connected: {} as {}", label, role);

        let client = Client { label, role, tx };
        client.send(&ServerMessage::Role(role));
        client.send(&ServerMessage::Msg(format!("Welcome. Your role is {}", role)));
        client.send(&ServerMessage::RecList(self.registry.to_json()));
        inner.clients.insert(id, client);
        inner.broadcast_census();

        (id, rx)
    }

    /// Remove a connection, promoting a new owner if needed
    pub fn disconnect(&self, id: ClientId) {
        let mut inner = self.inner.lock();
        let Some(client) = inner.clients.remove(&id) else {
            return;
        };
        tracing::info!("Client disconnected: {}", client.label);

        if inner.owner == Some(id) {
            inner.owner = None;
            let next = inner
                .clients
                .iter()
                .find(|(_, c)| c.is_open())
                .map(|(next_id, _)| *next_id);

            match next {
                Some(next_id) => {
                    inner.owner = Some(next_id);
                    if let Some(promoted) = inner.clients.get_mut(&next_id) {
                        promoted.role = Role::Owner;
                        promoted.send(&ServerMessage::Role(Role::Owner));
                        promoted.send(&ServerMessage::Msg("You are now OWNER (control granted)".into()));
                    }
                    let notice = format!("OWNER changed to {}", inner.owner_label());
                    inner.broadcast(&ServerMessage::Msg(notice));
                }
                None => {
                    inner.broadcast(&ServerMessage::Msg(
                        "OWNER disconnected, no clients left to own control".into(),
                    ));
                }
            }
        }

        inner.broadcast_census();
    }

    /// Handle one inbound text frame from `id`
    pub fn handle_message(&self, id: ClientId, text: &str) {
        let command = ClientCommand::parse(text);
        tracing::debug!("From web client {}: {}", id, text);

        if let ClientCommand::RequestRecordings = command {
            self.send_to(id, &ServerMessage::RecList(self.registry.to_json()));
            return;
        }

        if command.requires_owner() && !self.is_owner(id) {
            self.send_to(id, &ServerMessage::Msg("NOT_OWNER (view-only)".into()));
            self.send_to(id, &ServerMessage::Role(Role::Viewer));
            return;
        }

        if let Some(payload) = command.device_command() {
            self.relay_owner_command(id, payload);
            return;
        }

        match command {
            ClientCommand::DeleteRecording(key) => {
                self.send_to(id, &ServerMessage::Msg(format!("Delete of {} is not supported", key)));
            }
            ClientCommand::Other(text) => self.send_to(id, &ServerMessage::Echo(text)),
            _ => {}
        }
    }

    fn relay_owner_command(&self, id: ClientId, payload: &str) {
        let short = payload.strip_prefix("CMD:").unwrap_or(payload);
        match self.commands.dispatch(payload) {
            Ok(()) => {
                self.state.record_message(&format!("WEB(OWNER) -> UDP: {}", short));
                self.broadcast(&ServerMessage::Msg(format!("OWNER sent {}", short)));
            }
            Err(CommandError::NoRemote) => {
                self.send_to(id, &ServerMessage::Msg("No remote device IP configured".into()));
            }
            Err(e) => {
                tracing::warn!("Command {} not sent: {}", payload, e);
                self.send_to(id, &ServerMessage::Msg(format!("Command failed: {}", e)));
            }
        }
    }

    /// Push to every open connection, owner and viewers alike
    pub fn broadcast(&self, message: &ServerMessage) {
        self.inner.lock().broadcast(message);
    }

    pub fn broadcast_recordings(&self) {
        self.broadcast(&ServerMessage::RecList(self.registry.to_json()));
    }

    pub fn send_to(&self, id: ClientId, message: &ServerMessage) {
        if let Some(client) = self.inner.lock().clients.get(&id) {
            client.send(message);
        }
    }

    pub fn is_owner(&self, id: ClientId) -> bool {
        self.inner.lock().owner == Some(id)
    }

    pub fn role_of(&self, id: ClientId) -> Option<Role> {
        self.inner.lock().clients.get(&id).map(|c| c.role)
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.inner.lock().owner
    }

    pub fn client_count(&self) -> usize {
        self.inner.lock().clients.len()
    }

    /// Drop every connection; their outbound queues close
    pub fn close_all(&self) {
        let mut inner = self.inner.lock();
        inner.clients.clear();
        inner.owner = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every dispatched payload
    #[derive(Default)]
    pub(crate) struct RecordingDispatch {
        pub sent: Mutex<Vec<String>>,
        pub no_remote: bool,
    }

    impl CommandDispatch for RecordingDispatch {
        fn dispatch(&self, payload: &str) -> Result<(), CommandError> {
            if self.no_remote {
                return Err(CommandError::NoRemote);
            }
            self.sent.lock().push(payload.to_string());
            Ok(())
        }
    }

    fn hub_with(dispatch: Arc<RecordingDispatch>) -> Hub {
        Hub::new(
            Arc::new(RecordingRegistry::new()),
            Arc::new(BridgeState::new()),
            dispatch,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_first_connection_owns() {
        let hub = hub_with(Arc::default());
        let (owner, mut owner_rx) = hub.connect("a");
        let (viewer, mut viewer_rx) = hub.connect("b");

        assert_eq!(hub.role_of(owner), Some(Role::Owner));
        assert_eq!(hub.role_of(viewer), Some(Role::Viewer));

        let first = drain(&mut owner_rx);
        assert_eq!(first[0], "ROLE:OWNER");
        assert_eq!(first[1], "MSG:Welcome. Your role is OWNER");
        assert_eq!(first[2], "REC_LIST:[]");

        let second = drain(&mut viewer_rx);
        assert_eq!(second[0], "ROLE:VIEWER");
        assert!(second.contains(&"MSG:clients=2, owner=a".to_string()));
    }

    #[test]
    fn test_viewer_control_rejected_until_promoted() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let hub = hub_with(dispatch.clone());
        let (owner, _owner_rx) = hub.connect("a");
        let (viewer, mut viewer_rx) = hub.connect("b");
        drain(&mut viewer_rx);

        hub.handle_message(viewer, "WEB:CMD_START_REC");
        assert_eq!(
            drain(&mut viewer_rx),
            vec!["MSG:NOT_OWNER (view-only)", "ROLE:VIEWER"]
        );
        assert!(dispatch.sent.lock().is_empty());

        hub.disconnect(owner);
        assert!(hub.is_owner(viewer));
        let promoted = drain(&mut viewer_rx);
        assert_eq!(promoted[0], "ROLE:OWNER");
        assert!(promoted.contains(&"MSG:clients=1, owner=b".to_string()));

        hub.handle_message(viewer, "WEB:CMD_START_REC");
        assert_eq!(*dispatch.sent.lock(), vec!["CMD:start_rec_audio"]);
        assert!(drain(&mut viewer_rx).contains(&"MSG:OWNER sent start_rec_audio".to_string()));
    }

    #[test]
    fn test_closed_connections_are_not_promoted() {
        let hub = hub_with(Arc::default());
        let (owner, _owner_rx) = hub.connect("a");
        let (_gone, gone_rx) = hub.connect("b");
        let (live, _live_rx) = hub.connect("c");
        drop(gone_rx);

        hub.disconnect(owner);
        assert_eq!(hub.owner(), Some(live));
    }

    #[test]
    fn test_last_owner_leaving_clears_ownership() {
        let hub = hub_with(Arc::default());
        let (owner, _rx) = hub.connect("a");
        hub.disconnect(owner);
        assert_eq!(hub.owner(), None);
        assert_eq!(hub.client_count(), 0);

        let (next, _rx) = hub.connect("b");
        assert!(hub.is_owner(next));
    }

    #[test]
    fn test_non_control_messages_echo() {
        let hub = hub_with(Arc::default());
        let (_owner, _owner_rx) = hub.connect("a");
        let (viewer, mut viewer_rx) = hub.connect("b");
        drain(&mut viewer_rx);

        hub.handle_message(viewer, "ping");
        hub.handle_message(viewer, "WEB:REQ_RECORDINGS");
        assert_eq!(drain(&mut viewer_rx), vec!["ECHO:ping", "REC_LIST:[]"]);
    }

    #[test]
    fn test_owner_command_without_remote() {
        let dispatch = Arc::new(RecordingDispatch { no_remote: true, ..Default::default() });
        let hub = hub_with(dispatch);
        let (owner, mut rx) = hub.connect("a");
        drain(&mut rx);

        hub.handle_message(owner, "WEB:CMD_STOP_REC");
        assert_eq!(drain(&mut rx), vec!["MSG:No remote device IP configured"]);
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let hub = hub_with(Arc::default());
        let (_a, mut a_rx) = hub.connect("a");
        let (_b, mut b_rx) = hub.connect("b");
        drain(&mut a_rx);
        drain(&mut b_rx);

        hub.broadcast(&ServerMessage::Alarm { active: true });
        assert_eq!(drain(&mut a_rx), vec!["ALARM:SOS_ACTIVE"]);
        assert_eq!(drain(&mut b_rx), vec!["ALARM:SOS_ACTIVE"]);
    }
}
