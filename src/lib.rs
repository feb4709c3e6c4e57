//! # UDP Media Bridge
//!
//! Real-time bridge between an embedded sensor device and web/media clients.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── SENSOR DEVICE ────────────────────────────┐
//! │   audio frames [AAAA|seq|flags|len|pcm]       text / FILE_* markers   │
//! └──────────────┬───────────────────────────────────────┬────────────────┘
//!                │ UDP :5004                             │ UDP :5000
//!                ▼                                       ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────────────┐
//! │ Audio Listener               │      │ Control Listener ─► FIFO queue   │
//! │  sync/length check           │      │          │                       │
//! │  sequence gap ─► silence     │      │          ▼                       │
//! │  endian flip                 │      │ Control Processor (thread)       │
//! └──────────────┬───────────────┘      │  status / distress / transfers   │
//!                ▼                      └───────┬──────────────┬───────────┘
//! ┌──────────────────────────────┐              │              ▼
//! │ Ring Buffer (multi-reader)   │              │   ┌────────────────────────┐
//! └──────────────┬───────────────┘              │   │ File Reassembly        │
//!                ▼                              │   │  ─► Recording Registry │
//! ┌──────────────────────────────┐              │   └───────────┬────────────┘
//! │ HTTP Media Gateway :8081     │◄─────────────┼───────────────┘
//! │  /live.wav  /media/audio/... │              ▼
//! └──────────────────────────────┘   ┌──────────────────────────────────┐
//!                                    │ Broadcast Hub (WebSocket :8090)  │
//!                                    │  owner / viewer arbitration      │
//!                                    └───────────────┬──────────────────┘
//!                                                    ▼
//!                                    Command Sender ─► device UDP :5005
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod network;
pub mod protocol;
pub mod recordings;
pub mod service;
pub mod state;
pub mod web;

pub use error::{Error, Result};
pub use service::Bridge;

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Default UDP port for text and file-chunk messages
    pub const DEFAULT_CONTROL_PORT: u16 = 5000;

    /// Default UDP port for audio frames
    pub const DEFAULT_AUDIO_PORT: u16 = 5004;

    /// Default HTTP media gateway port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;

    /// Default WebSocket port
    pub const DEFAULT_WS_PORT: u16 = 8090;

    /// Default device port for outbound commands
    pub const DEFAULT_REMOTE_COMMAND_PORT: u16 = 5005;

    /// Default sample rate of the device stream
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

    /// Live audio ring buffer capacity in bytes
    pub const RING_BUFFER_CAPACITY: usize = 512 * 1024;

    /// Silence written per lost frame
    pub const SILENCE_CHUNK_BYTES: usize = 1024;

    /// Largest sequence gap that is backfilled with silence
    pub const MAX_GAP_REPAIR: u16 = 50;

    /// Bounded wait of a blocked ring buffer reader
    pub const READ_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Receive buffer for one audio datagram
    pub const MAX_PACKET_SIZE: usize = 4096;

    /// Receive buffer for one control datagram
    pub const MAX_CONTROL_DATAGRAM: usize = 8192;

    /// Entries kept in the status history
    pub const EVENT_HISTORY_LEN: usize = 10;

    /// Pending outbound frames per WebSocket client
    pub const CLIENT_QUEUE_LEN: usize = 256;

    /// Pending outbound device commands
    pub const COMMAND_QUEUE_LEN: usize = 64;

    /// Progress is broadcast every N chunks and on the last one
    pub const PROGRESS_INTERVAL_CHUNKS: u32 = 10;

    /// Subdirectory of the data dir holding reassembled files
    pub const RECEIVED_DIR_NAME: &str = "received";

    /// Length of a generated command secret
    pub const SECRET_KEY_LENGTH: usize = 6;

    /// Bytes copied per live stream read
    pub const LIVE_READ_CHUNK: usize = 4096;
}
