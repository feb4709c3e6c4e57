//! Error types for the bridge

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error only reports a resource that is already gone
    /// (closed socket or queue, stopped worker). Retrying cannot help.
    pub fn is_ignorable(&self) -> bool {
        match self {
            Error::Network(NetworkError::Closed) => true,
            Error::Command(CommandError::Stopped) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

/// Socket-level errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("Cannot start worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Socket closed")]
    Closed,
}

/// Malformed audio datagrams
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Datagram too short: {0} bytes")]
    TooShort(usize),

    #[error("Bad sync word: {0:#06x}")]
    BadSync(u16),

    #[error("Payload length {declared} exceeds datagram ({available} bytes available)")]
    PayloadOverrun { declared: usize, available: usize },
}

/// File reassembly errors
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Malformed marker: {0}")]
    MalformedMarker(String),

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("No transfer in progress for {0:?}")]
    UnknownSession(String),

    #[error("Chunk decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("File I/O failed for {name:?}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Registration failed: {0}")]
    Register(#[from] RecordingError),
}

/// Recording registry errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound command path errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("No remote device configured")]
    NoRemote,

    #[error("Command queue full")]
    QueueFull,

    #[error("Command worker stopped")]
    Stopped,

    #[error("Cannot resolve remote device {0}")]
    Resolve(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
