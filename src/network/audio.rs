//! Binary audio ingest
//!
//! `AudioIngest` is the per-datagram state machine (validation, sequence-gap
//! repair, distress edges, byte order). `AudioListener` owns the socket and
//! feeds it.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::audio::SharedRingBuffer;
use crate::config::AudioConfig;
use crate::constants::MAX_PACKET_SIZE;
use crate::error::{FrameError, NetworkError};
use crate::events::EventPublisher;
use crate::network::udp::create_socket;
use crate::protocol::frame::{swap_byte_pairs, AudioFrame};

/// Forward distance from the expected successor of `last` to `current`, mod 2^16
pub fn sequence_gap(last: u16, current: u16) -> u16 {
    current.wrapping_sub(last.wrapping_add(1))
}

/// What one accepted frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub silence_chunks: u16,
    /// New distress flag value when it flipped on this frame
    pub distress_edge: Option<bool>,
}

/// Ingest counters
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub silence_chunks: u64,
    pub discontinuities: u64,
}

pub struct AudioIngest {
    buffer: SharedRingBuffer,
    last_sequence: Option<u16>,
    last_distress: bool,
    silence_chunk_bytes: usize,
    max_gap_repair: u16,
    force_endian_flip: bool,
    scratch: Vec<u8>,
    stats: IngestStats,
}

impl AudioIngest {
    pub fn new(buffer: SharedRingBuffer, config: &AudioConfig) -> Self {
        Self {
            buffer,
            last_sequence: None,
            last_distress: false,
            silence_chunk_bytes: config.silence_chunk_bytes,
            max_gap_repair: config.max_gap_repair,
            force_endian_flip: config.force_endian_flip,
            scratch: Vec::with_capacity(MAX_PACKET_SIZE),
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn last_sequence(&self) -> Option<u16> {
        self.last_sequence
    }

    /// Validate one datagram and push its audio (plus any gap fill) to the ring buffer
    pub fn process(&mut self, datagram: &[u8]) -> Result<IngestOutcome, FrameError> {
        let frame = match AudioFrame::parse(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.frames_dropped += 1;
                return Err(e);
            }
        };

        let mut outcome = IngestOutcome::default();

        if let Some(last) = self.last_sequence {
            let gap = sequence_gap(last, frame.sequence);
            if gap != 0 {
                if gap <= self.max_gap_repair {
                    for _ in 0..gap {
                        self.buffer.write_silence(self.silence_chunk_bytes);
                    }
                    outcome.silence_chunks = gap;
                    self.stats.silence_chunks += u64::from(gap);
                } else {
                    // Device restart or long outage; nothing sensible to backfill
                    self.stats.discontinuities += 1;
                    tracing::debug!("Sequence discontinuity {} -> {}", last, frame.sequence);
                }
            }
        }
        self.last_sequence = Some(frame.sequence);

        if frame.distress != self.last_distress {
            self.last_distress = frame.distress;
            outcome.distress_edge = Some(frame.distress);
        }

        if !frame.payload.is_empty() {
            if frame.big_endian || self.force_endian_flip {
                self.scratch.clear();
                self.scratch.extend_from_slice(frame.payload);
                swap_byte_pairs(&mut self.scratch);
                self.buffer.write(&self.scratch);
            } else {
                self.buffer.write(frame.payload);
            }
        }

        self.stats.frames_accepted += 1;
        Ok(outcome)
    }
}

/// Receive loop for the audio port
pub struct AudioListener {
    socket: UdpSocket,
    ingest: AudioIngest,
    events: EventPublisher,
}

impl AudioListener {
    pub fn bind(
        addr: SocketAddr,
        recv_buffer: usize,
        ingest: AudioIngest,
        events: EventPublisher,
    ) -> Result<Self, NetworkError> {
        let socket = create_socket(addr, recv_buffer)?;
        tracing::info!("Audio listener bound on {}", addr);
        Ok(Self { socket, ingest, events })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs until shutdown (`Ok`) or a socket failure (`Err`)
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), NetworkError> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let len = match received {
                Ok((len, _)) => len,
                Err(e) => {
                    tracing::error!("Audio listener receive failed: {}", e);
                    return Err(NetworkError::ReceiveFailed(e));
                }
            };

            match self.ingest.process(&buf[..len]) {
                Ok(outcome) => {
                    if let Some(active) = outcome.distress_edge {
                        self.events.distress(active);
                    }
                }
                Err(e) => tracing::debug!("Dropping audio datagram: {}", e),
            }
        }

        let stats = self.ingest.stats();
        tracing::info!(
            "Audio listener stopped: {} frames, {} dropped, {} silence chunks, {} discontinuities",
            stats.frames_accepted,
            stats.frames_dropped,
            stats.silence_chunks,
            stats.discontinuities
        );
        Ok(())
    }
}
