//! Text control protocol
//!
//! One UTF-8 line per datagram:
//! `FILE_START:<name>:<total>`, `FILE_CHUNK:<name>:<index>:<base64>`,
//! `FILE_END:<name>`, the distress tokens, or free status text.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::TransferError;

const FILE_START: &str = "FILE_START:";
const FILE_CHUNK: &str = "FILE_CHUNK:";
const FILE_END: &str = "FILE_END:";

const DISTRESS_TOKENS: [&str; 2] = ["!", "SOS_ACTIVE"];
const CLEAR_TOKENS: [&str; 2] = ["CANCEL_SOS", "SOS_CANCELLED"];

/// Standard alphabet, padding optional
const CHUNK_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// A decoded control datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    FileStart { name: String, total_chunks: u32 },
    /// `index` is informational; chunks are appended in arrival order
    FileChunk { name: String, index: Option<u32>, data: Vec<u8> },
    FileEnd { name: String },
    DistressActive,
    DistressCleared,
    Status(String),
}

impl ControlMessage {
    /// Parse one datagram's text. Blank input yields `Ok(None)`.
    pub fn parse(text: &str) -> Result<Option<Self>, TransferError> {
        let payload = text.trim();
        if payload.is_empty() {
            return Ok(None);
        }

        if payload.starts_with("FILE_") {
            return parse_file_marker(payload).map(Some);
        }

        if DISTRESS_TOKENS.contains(&payload) {
            return Ok(Some(ControlMessage::DistressActive));
        }
        if CLEAR_TOKENS.contains(&payload) {
            return Ok(Some(ControlMessage::DistressCleared));
        }

        Ok(Some(ControlMessage::Status(payload.to_string())))
    }
}

fn parse_file_marker(payload: &str) -> Result<ControlMessage, TransferError> {
    let malformed = || TransferError::MalformedMarker(payload.chars().take(64).collect());

    if let Some(rest) = payload.strip_prefix(FILE_START) {
        let (name, total) = rest.split_once(':').ok_or_else(malformed)?;
        let total_chunks = total.trim().parse().map_err(|_| malformed())?;
        return Ok(ControlMessage::FileStart {
            name: validate_file_name(name)?,
            total_chunks,
        });
    }

    if let Some(rest) = payload.strip_prefix(FILE_CHUNK) {
        let mut parts = rest.splitn(3, ':');
        let (name, index, body) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(i), Some(b)) => (n, i, b),
            _ => return Err(malformed()),
        };
        let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let data = CHUNK_ENGINE.decode(cleaned.as_bytes())?;
        return Ok(ControlMessage::FileChunk {
            name: validate_file_name(name)?,
            index: index.trim().parse().ok(),
            data,
        });
    }

    if let Some(name) = payload.strip_prefix(FILE_END) {
        return Ok(ControlMessage::FileEnd {
            name: validate_file_name(name)?,
        });
    }

    Err(malformed())
}

/// Trim and reject names that could escape the received directory
pub fn validate_file_name(raw: &str) -> Result<String, TransferError> {
    let name = raw.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(TransferError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}
