//! Chunked file reassembly
//!
//! One session per file name: `FILE_START` opens (or restarts) it,
//! `FILE_CHUNK` appends in arrival order, `FILE_END` closes the file and
//! registers it. Sessions have no timeout; one that never sees `FILE_END`
//! stays open until shutdown.
//!
//! Files are named after the transfer, so a `FILE_START` for a name that
//! already completed truncates the file behind the existing recording. The
//! old registry entry stays (with its stale size) and the next `FILE_END`
//! adds a second entry for the same path.

use dashmap::DashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::TransferError;
use crate::recordings::registry::{Recording, RecordingRegistry};

/// Observable result of one transfer step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started { name: String, total_chunks: u32 },
    Progress { name: String, received: u32, total_chunks: u32 },
    Completed { name: String, recording: Recording },
}

struct Session {
    total_chunks: u32,
    received: u32,
    sink: BufWriter<File>,
    path: PathBuf,
}

impl Session {
    fn close(mut self, name: &str) -> Result<PathBuf, TransferError> {
        let io_err = |source| TransferError::Io { name: name.to_string(), source };
        self.sink.flush().map_err(io_err)?;
        let file = self.sink.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        Ok(self.path)
    }
}

/// Live transfer sessions keyed by file name
pub struct TransferTracker {
    dir: PathBuf,
    sessions: DashMap<String, Session>,
    registry: Arc<RecordingRegistry>,
}

impl TransferTracker {
    /// Files land in `dir`, created on first use
    pub fn new(dir: impl Into<PathBuf>, registry: Arc<RecordingRegistry>) -> Self {
        Self {
            dir: dir.into(),
            sessions: DashMap::new(),
            registry,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open a fresh sink, discarding any partial file of the same name
    pub fn start(&self, name: &str, total_chunks: u32) -> Result<TransferEvent, TransferError> {
        let io_err = |source| TransferError::Io { name: name.to_string(), source };

        if self.sessions.remove(name).is_some() {
            tracing::info!("Restarting transfer of {}, previous partial data discarded", name);
        }

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let path = self.dir.join(name);
        if self.overwrites_recording(&path) {
            tracing::warn!("Transfer of {} overwrites an already registered recording", name);
        }
        let file = File::create(&path).map_err(io_err)?;

        self.sessions.insert(
            name.to_string(),
            Session {
                total_chunks,
                received: 0,
                sink: BufWriter::new(file),
                path,
            },
        );
        tracing::info!("Receiving {} ({} chunks)", name, total_chunks);

        Ok(TransferEvent::Started {
            name: name.to_string(),
            total_chunks,
        })
    }

    fn overwrites_recording(&self, path: &Path) -> bool {
        std::fs::canonicalize(path)
            .map(|existing| self.registry.contains_path(&existing))
            .unwrap_or(false)
    }

    /// Append one decoded chunk
    pub fn append(&self, name: &str, data: &[u8]) -> Result<TransferEvent, TransferError> {
        let mut session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| TransferError::UnknownSession(name.to_string()))?;

        let written = session.sink.write_all(data);
        if let Err(source) = written {
            drop(session);
            // A sink that failed mid-write is not worth finishing
            self.sessions.remove(name);
            return Err(TransferError::Io { name: name.to_string(), source });
        }
        session.received += 1;

        Ok(TransferEvent::Progress {
            name: name.to_string(),
            received: session.received,
            total_chunks: session.total_chunks,
        })
    }

    /// Close the sink, register the file, forget the session
    pub fn finish(&self, name: &str) -> Result<TransferEvent, TransferError> {
        let (_, session) = self
            .sessions
            .remove(name)
            .ok_or_else(|| TransferError::UnknownSession(name.to_string()))?;

        if session.received != session.total_chunks {
            tracing::warn!(
                "{} finished with {}/{} chunks",
                name,
                session.received,
                session.total_chunks
            );
        }

        let path = session.close(name)?;
        let recording = self.registry.register(&path)?;
        Ok(TransferEvent::Completed {
            name: name.to_string(),
            recording,
        })
    }

    pub fn is_receiving(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Flush and close every open sink without registering anything
    pub fn close_all(&self) {
        let names: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, session)) = self.sessions.remove(&name) {
                if let Err(e) = session.close(&name) {
                    tracing::warn!("Closing unfinished transfer failed: {}", e);
                }
            }
        }
    }
}
