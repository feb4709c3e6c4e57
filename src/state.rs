//! Shared status written by both UDP listeners and the hub

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;

use crate::constants::EVENT_HISTORY_LEN;

/// One timestamped status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    #[serde(rename = "msg")]
    pub message: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`
    #[serde(rename = "time")]
    pub timestamp: String,
}

impl EventRecord {
    fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Serializable view for `/status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub sos_active: bool,
    pub last_message: String,
    pub device_ip: String,
    pub last_received_file: Option<String>,
    pub last_recording_key: Option<String>,
    pub history: Vec<EventRecord>,
}

struct Inner {
    last_message: String,
    distress_active: bool,
    last_received_file: Option<String>,
    last_recording_key: Option<String>,
    /// Newest first
    history: VecDeque<EventRecord>,
}

pub struct BridgeState {
    inner: RwLock<Inner>,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                last_message: "No messages yet".to_string(),
                distress_active: false,
                last_received_file: None,
                last_recording_key: None,
                history: VecDeque::with_capacity(EVENT_HISTORY_LEN),
            }),
        }
    }

    /// Store as last message and prepend to the bounded history
    pub fn record_message(&self, message: &str) {
        let mut inner = self.inner.write();
        inner.last_message = message.to_string();
        inner.history.push_front(EventRecord::now(message));
        inner.history.truncate(EVENT_HISTORY_LEN);
    }

    /// Returns true only when the flag actually changed
    pub fn set_distress(&self, active: bool) -> bool {
        let mut inner = self.inner.write();
        if inner.distress_active == active {
            return false;
        }
        inner.distress_active = active;
        true
    }

    pub fn is_distress_active(&self) -> bool {
        self.inner.read().distress_active
    }

    pub fn last_message(&self) -> String {
        self.inner.read().last_message.clone()
    }

    pub fn history(&self) -> Vec<EventRecord> {
        self.inner.read().history.iter().cloned().collect()
    }

    pub fn set_last_received(&self, path: String, recording_key: String) {
        let mut inner = self.inner.write();
        inner.last_received_file = Some(path);
        inner.last_recording_key = Some(recording_key);
    }

    pub fn snapshot(&self, device_ip: &str) -> StatusSnapshot {
        let inner = self.inner.read();
        StatusSnapshot {
            sos_active: inner.distress_active,
            last_message: inner.last_message.clone(),
            device_ip: device_ip.to_string(),
            last_received_file: inner.last_received_file.clone(),
            last_recording_key: inner.last_recording_key.clone(),
            history: inner.history.iter().cloned().collect(),
        }
    }
}
