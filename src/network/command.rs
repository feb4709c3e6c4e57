//! Outbound device commands
//!
//! A single worker thread owns the sending socket and drains a bounded queue,
//! so concurrent web requests never spawn unbounded send tasks.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread::{self, JoinHandle};

use crate::constants::COMMAND_QUEUE_LEN;
use crate::error::{CommandError, NetworkError};
use crate::hub::CommandDispatch;

#[derive(Debug, Clone)]
enum Target {
    Unset,
    Unresolved(String),
    Addr(SocketAddr),
}

pub struct CommandSender {
    target: Target,
    tx: Mutex<Option<Sender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandSender {
    /// Start the worker. A blank `remote_ip` leaves the path disabled.
    pub fn start(remote_ip: &str, remote_port: u16, secret: String) -> Result<Self, NetworkError> {
        let remote_ip = remote_ip.trim();
        let target = if remote_ip.is_empty() {
            Target::Unset
        } else {
            match (remote_ip, remote_port).to_socket_addrs().map(|mut a| a.next()) {
                Ok(Some(addr)) => Target::Addr(addr),
                _ => {
                    tracing::warn!("Cannot resolve remote device {}:{}", remote_ip, remote_port);
                    Target::Unresolved(format!("{}:{}", remote_ip, remote_port))
                }
            }
        };

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|source| NetworkError::BindFailed {
            addr: "0.0.0.0:0".to_string(),
            source,
        })?;

        let (tx, rx) = bounded::<String>(COMMAND_QUEUE_LEN);
        let worker_target = target.clone();
        let worker = thread::Builder::new()
            .name("command-sender".to_string())
            .spawn(move || {
                let Target::Addr(addr) = worker_target else {
                    // Drain so senders see a live queue; nothing can be delivered
                    for _ in rx.iter() {}
                    return;
                };
                for payload in rx.iter() {
                    let message = format!("{}|{}", secret, payload);
                    tracing::debug!("Sending command to {} -> {}", addr, payload);
                    if let Err(e) = socket.send_to(message.as_bytes(), addr) {
                        tracing::warn!("{}", NetworkError::SendFailed(e));
                    }
                }
            })
            .map_err(NetworkError::WorkerSpawn)?;

        Ok(Self {
            target,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        match self.target {
            Target::Addr(addr) => Some(addr),
            _ => None,
        }
    }

    /// Stop accepting commands and wait for the queue to drain
    pub fn shutdown(&self) {
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl CommandDispatch for CommandSender {
    fn dispatch(&self, payload: &str) -> Result<(), CommandError> {
        match &self.target {
            Target::Unset => return Err(CommandError::NoRemote),
            Target::Unresolved(remote) => return Err(CommandError::Resolve(remote.clone())),
            Target::Addr(_) => {}
        }

        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(CommandError::Stopped)?;
        tx.try_send(payload.to_string()).map_err(|e| match e {
            TrySendError::Full(_) => CommandError::QueueFull,
            TrySendError::Disconnected(_) => CommandError::Stopped,
        })
    }
}

impl Drop for CommandSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}
