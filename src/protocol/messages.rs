//! WebSocket text vocabulary

use serde::Serialize;
use std::fmt;

/// Connection role in the broadcast hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server → client messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Role(Role),
    Msg(String),
    /// Pre-serialized JSON array of recordings
    RecList(String),
    Alarm { active: bool },
    FileStart { name: String, total_chunks: u32 },
    FileProgress { name: String, received: u32, total_chunks: u32 },
    FileEnd { name: String, id: String },
    Echo(String),
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Role(role) => write!(f, "ROLE:{}", role),
            ServerMessage::Msg(text) => write!(f, "MSG:{}", text),
            ServerMessage::RecList(json) => write!(f, "REC_LIST:{}", json),
            ServerMessage::Alarm { active: true } => f.write_str("ALARM:SOS_ACTIVE"),
            ServerMessage::Alarm { active: false } => f.write_str("ALARM:SOS_OFF"),
            ServerMessage::FileStart { name, total_chunks } => {
                write!(f, "FILE_START:{}:{}", name, total_chunks)
            }
            ServerMessage::FileProgress { name, received, total_chunks } => {
                write!(f, "FILE_PROGRESS:{}:{}/{}", name, received, total_chunks)
            }
            ServerMessage::FileEnd { name, id } => write!(f, "FILE_END:{}:{}", name, id),
            ServerMessage::Echo(text) => write!(f, "ECHO:{}", text),
        }
    }
}

/// Client → server messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    RequestRecordings,
    StartRecording,
    StopRecording,
    DeleteRecording(String),
    /// Anything else; echoed back
    Other(String),
}

impl ClientCommand {
    pub fn parse(text: &str) -> Self {
        match text {
            "WEB:REQ_RECORDINGS" => ClientCommand::RequestRecordings,
            "WEB:CMD_START_REC" => ClientCommand::StartRecording,
            "WEB:CMD_STOP_REC" => ClientCommand::StopRecording,
            _ => match text.strip_prefix("WEB:DELETE_RECORDING:") {
                Some(key) => ClientCommand::DeleteRecording(key.to_string()),
                None => ClientCommand::Other(text.to_string()),
            },
        }
    }

    /// Control-class commands are reserved for the owner
    pub fn requires_owner(&self) -> bool {
        matches!(
            self,
            ClientCommand::StartRecording
                | ClientCommand::StopRecording
                | ClientCommand::DeleteRecording(_)
        )
    }

    /// ASCII command relayed to the device, if any
    pub fn device_command(&self) -> Option<&'static str> {
        match self {
            ClientCommand::StartRecording => Some(DEVICE_START_RECORDING),
            ClientCommand::StopRecording => Some(DEVICE_STOP_RECORDING),
            _ => None,
        }
    }
}

pub const DEVICE_START_RECORDING: &str = "CMD:start_rec_audio";
pub const DEVICE_STOP_RECORDING: &str = "CMD:stop_rec_audio";

/// Map an HTTP `/command` action name to its device command
pub fn device_action(action: &str) -> String {
    match action {
        "RECORD_START" => DEVICE_START_RECORDING.to_string(),
        "RECORD_STOP" => DEVICE_STOP_RECORDING.to_string(),
        "SOS" => "CMD:sos".to_string(),
        "GAIN_UP" => "CMD:gain_up".to_string(),
        "GAIN_DOWN" => "CMD:gain_down".to_string(),
        "STREAM_START" => "CMD:stream_start".to_string(),
        "STREAM_STOP" => "CMD:stream_stop".to_string(),
        other => other.to_string(),
    }
}
