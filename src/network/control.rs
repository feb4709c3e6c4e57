//! Text / file-chunk control port
//!
//! The receive loop only decodes UTF-8 and enqueues; a processor thread
//! drains the bounded queue in FIFO order so file writes and broadcasts never
//! stall the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::constants::{MAX_CONTROL_DATAGRAM, PROGRESS_INTERVAL_CHUNKS};
use crate::error::{NetworkError, TransferError};
use crate::events::EventPublisher;
use crate::network::udp::create_socket;
use crate::protocol::ControlMessage;
use crate::recordings::{TransferEvent, TransferTracker};

/// Bounded FIFO between the receive loop and the processor
pub fn control_queue(capacity: usize) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(capacity)
}

pub struct ControlListener {
    socket: UdpSocket,
    queue: mpsc::Sender<String>,
}

impl ControlListener {
    pub fn bind(
        addr: SocketAddr,
        recv_buffer: usize,
        queue: mpsc::Sender<String>,
    ) -> Result<Self, NetworkError> {
        let socket = create_socket(addr, recv_buffer)?;
        tracing::info!("Control listener bound on {}", addr);
        Ok(Self { socket, queue })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs until shutdown (`Ok`) or a socket failure (`Err`)
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), NetworkError> {
        let mut buf = vec![0u8; MAX_CONTROL_DATAGRAM];
        let mut dropped: u64 = 0;
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let len = match received {
                Ok((len, _)) => len,
                Err(e) => {
                    tracing::error!("Control listener receive failed: {}", e);
                    return Err(NetworkError::ReceiveFailed(e));
                }
            };

            let text = String::from_utf8_lossy(&buf[..len]).trim().to_string();
            if text.is_empty() {
                continue;
            }

            match self.queue.try_send(text) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::debug!("Control queue full, {} datagrams dropped so far", dropped);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(NetworkError::Closed),
            }
        }
        Ok(())
    }
}

/// Applies control messages in arrival order
pub struct ControlProcessor {
    tracker: Arc<TransferTracker>,
    events: EventPublisher,
}

impl ControlProcessor {
    pub fn new(tracker: Arc<TransferTracker>, events: EventPublisher) -> Self {
        Self { tracker, events }
    }

    /// Drain `queue` on a dedicated thread until every sender is gone
    pub fn spawn(self, mut queue: mpsc::Receiver<String>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("control-processor".to_string())
            .spawn(move || {
                while let Some(text) = queue.blocking_recv() {
                    self.handle(&text);
                }
                tracing::debug!("Control processor finished");
            })
    }

    pub fn handle(&self, text: &str) {
        match ControlMessage::parse(text) {
            Ok(Some(message)) => self.apply(message),
            Ok(None) => {}
            Err(e) => tracing::debug!("Dropping control datagram: {}", e),
        }
    }

    fn apply(&self, message: ControlMessage) {
        match message {
            ControlMessage::FileStart { name, total_chunks } => {
                self.transfer_step(self.tracker.start(&name, total_chunks));
            }
            ControlMessage::FileChunk { name, data, .. } => {
                match self.tracker.append(&name, &data) {
                    Ok(TransferEvent::Progress { received, total_chunks, .. })
                        if received % PROGRESS_INTERVAL_CHUNKS != 0 && received != total_chunks => {}
                    result => self.transfer_step(result),
                }
            }
            ControlMessage::FileEnd { name } => {
                self.transfer_step(self.tracker.finish(&name));
            }
            ControlMessage::DistressActive => self.events.distress(true),
            ControlMessage::DistressCleared => self.events.distress(false),
            ControlMessage::Status(text) => self.events.status(&text),
        }
    }

    fn transfer_step(&self, result: Result<TransferEvent, TransferError>) {
        match result {
            Ok(event) => self.events.transfer(event),
            Err(TransferError::UnknownSession(name)) => {
                tracing::debug!("Chunk or end marker for unknown transfer {:?}", name);
            }
            Err(e) => tracing::error!("File transfer aborted: {}", e),
        }
    }
}
