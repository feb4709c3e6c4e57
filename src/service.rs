//! Wiring of listeners, processor and web servers into one service

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::audio::{create_shared_buffer, SharedRingBuffer};
use crate::config::AppConfig;
use crate::error::{Error, NetworkError, Result};
use crate::events::EventPublisher;
use crate::hub::{CommandDispatch, Hub};
use crate::network::{control_queue, AudioIngest, AudioListener, CommandSender, ControlListener, ControlProcessor};
use crate::recordings::{RecordingRegistry, TransferTracker};
use crate::state::BridgeState;
use crate::web::{self, AppState};

/// Delay before a failed UDP listener is rebound
const LISTENER_RESTART_BACKOFF: Duration = Duration::from_secs(1);

pub struct Bridge {
    config: Arc<AppConfig>,
    ring: SharedRingBuffer,
    registry: Arc<RecordingRegistry>,
    tracker: Arc<TransferTracker>,
    state: Arc<BridgeState>,
    hub: Arc<Hub>,
    commands: Arc<CommandSender>,
    events: EventPublisher,
}

impl Bridge {
    /// Build every component and recover recordings left from a previous run
    pub fn new(config: AppConfig) -> Result<Self> {
        let config = Arc::new(config);
        let received_dir = config.storage.received_dir();
        std::fs::create_dir_all(&received_dir)?;

        let ring = create_shared_buffer(config.audio.ring_buffer_bytes);
        let registry = Arc::new(RecordingRegistry::new());
        match registry.scan_directory(&received_dir) {
            Ok(n) => tracing::info!("Recovered {} recordings from {}", n, received_dir.display()),
            Err(e) => tracing::warn!("Recording scan failed: {}", e),
        }
        let tracker = Arc::new(TransferTracker::new(received_dir, registry.clone()));
        let state = Arc::new(BridgeState::new());

        let secret = config.security.resolve_secret();
        tracing::info!("Command secret key: {}", secret);
        let commands = Arc::new(CommandSender::start(
            &config.network.remote_device_ip,
            config.network.remote_command_port,
            secret,
        )?);
        match commands.remote() {
            Some(addr) => tracing::info!("Outbound commands go to {}", addr),
            None => tracing::warn!("No remote device configured, outbound commands disabled"),
        }

        let dispatch: Arc<dyn CommandDispatch> = commands.clone();
        let hub = Arc::new(Hub::new(registry.clone(), state.clone(), dispatch));
        let events = EventPublisher::new(state.clone(), hub.clone());

        Ok(Self {
            config,
            ring,
            registry,
            tracker,
            state,
            hub,
            commands,
            events,
        })
    }

    pub fn ring(&self) -> &SharedRingBuffer {
        &self.ring
    }

    pub fn registry(&self) -> &Arc<RecordingRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    fn app_state(&self, shutdown: CancellationToken) -> AppState {
        AppState {
            config: self.config.clone(),
            ring: self.ring.clone(),
            registry: self.registry.clone(),
            state: self.state.clone(),
            hub: self.hub.clone(),
            commands: self.commands.clone(),
            shutdown,
        }
    }

    /// Run until `shutdown` fires, then tear everything down in order
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let network = &self.config.network;
        let audio_addr = network.audio_addr()?;
        let control_addr = network.control_addr()?;
        let http_addr = network.http_addr()?;
        let ws_addr = network.ws_addr()?;

        let (queue_tx, queue_rx) = control_queue(network.control_queue_capacity);
        let processor = ControlProcessor::new(self.tracker.clone(), self.events.clone()).spawn(queue_rx)?;

        let mut tasks = JoinSet::new();

        let audio = {
            let ring = self.ring.clone();
            let events = self.events.clone();
            let config = self.config.clone();
            let token = shutdown.clone();
            move || {
                let ingest = AudioIngest::new(ring.clone(), &config.audio);
                AudioListener::bind(audio_addr, config.network.audio_recv_buffer_bytes, ingest, events.clone())
                    .map(|listener| listener.run(token.clone()))
            }
        };
        tasks.spawn(supervise("audio", shutdown.clone(), audio));

        let control = {
            let recv_buffer = network.control_recv_buffer_bytes;
            let token = shutdown.clone();
            move || {
                ControlListener::bind(control_addr, recv_buffer, queue_tx.clone())
                    .map(|listener| listener.run(token.clone()))
            }
        };
        tasks.spawn(supervise("control", shutdown.clone(), control));

        let app = self.app_state(shutdown.clone());
        tasks.spawn(serve_web("HTTP", http_addr, web::router(app.clone()), shutdown.clone()));
        tasks.spawn(serve_web("WebSocket", ws_addr, web::ws_router(app), shutdown.clone()));

        shutdown.cancelled().await;
        tracing::info!("Shutting down bridge");

        // Ends live streams and WebSocket send loops
        self.ring.close();
        self.hub.close_all();

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Service task ended abnormally: {}", e);
            }
        }

        // Every queue sender is gone once the control listener has stopped
        match tokio::task::spawn_blocking(move || processor.join()).await {
            Ok(Ok(())) => {}
            _ => tracing::warn!("Control processor did not stop cleanly"),
        }
        self.tracker.close_all();

        let commands = self.commands.clone();
        if tokio::task::spawn_blocking(move || commands.shutdown()).await.is_err() {
            tracing::warn!("Command sender did not stop cleanly");
        }

        tracing::info!("Bridge stopped");
        Ok(())
    }
}

/// Keep a UDP listener alive, rebinding after a backoff when it fails.
/// A listener whose downstream is gone stops for good.
async fn supervise<F, Fut>(name: &'static str, shutdown: CancellationToken, mut launch: F)
where
    F: FnMut() -> std::result::Result<Fut, NetworkError>,
    Fut: Future<Output = std::result::Result<(), NetworkError>>,
{
    loop {
        let outcome = match launch() {
            Ok(running) => running.await,
            Err(e) => Err(e),
        };
        match outcome.map_err(Error::from) {
            Ok(()) => break,
            Err(e) if e.is_ignorable() => {
                tracing::warn!("{} listener stopped without restart: {}", name, e);
                return;
            }
            Err(e) => tracing::error!("{} listener failed: {}", name, e),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(LISTENER_RESTART_BACKOFF) => {}
        }
        tracing::info!("Restarting {} listener", name);
    }
    tracing::debug!("{} listener stopped", name);
}

async fn serve_web(name: &'static str, addr: SocketAddr, app: axum::Router, shutdown: CancellationToken) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            let e = NetworkError::BindFailed {
                addr: addr.to_string(),
                source,
            };
            tracing::error!("{} server unavailable: {}", name, e);
            return;
        }
    };
    tracing::info!("{} server listening on {}", name, addr);
    match web::serve(listener, app, shutdown).await.map_err(Error::from) {
        Ok(()) => tracing::debug!("{} server stopped", name),
        Err(e) if e.is_ignorable() => tracing::debug!("{} server closed: {}", name, e),
        Err(e) => tracing::error!("{} server failed: {}", name, e),
    }
}
