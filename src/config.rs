//! Application configuration
//!
//! Every section has defaults so a partial (or missing) TOML file is fine.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub ui: UiConfig,
}

/// Ports and addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    /// Text / file-chunk protocol
    pub control_port: u16,
    /// Binary audio protocol
    pub audio_port: u16,
    pub http_port: u16,
    pub ws_port: u16,
    /// Address advertised to web clients
    pub device_ip: String,
    /// Where outbound commands go; blank disables the command path
    pub remote_device_ip: String,
    pub remote_command_port: u16,
    pub audio_recv_buffer_bytes: usize,
    pub control_recv_buffer_bytes: usize,
    pub control_queue_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            audio_port: DEFAULT_AUDIO_PORT,
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
            device_ip: String::new(),
            remote_device_ip: String::new(),
            remote_command_port: DEFAULT_REMOTE_COMMAND_PORT,
            audio_recv_buffer_bytes: 2 * 1024 * 1024,
            control_recv_buffer_bytes: 1024 * 1024,
            control_queue_capacity: 1024,
        }
    }
}

impl NetworkConfig {
    fn addr(&self, port: u16) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, port)
            .parse()
            .map_err(|e| Error::Config(format!("bad bind address {:?}: {}", self.bind_address, e)))
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        self.addr(self.control_port)
    }

    pub fn audio_addr(&self) -> Result<SocketAddr> {
        self.addr(self.audio_port)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        self.addr(self.http_port)
    }

    pub fn ws_addr(&self) -> Result<SocketAddr> {
        self.addr(self.ws_port)
    }
}

/// Live audio format and ingest tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Swap payload byte pairs even when the frame flag is clear
    pub force_endian_flip: bool,
    pub ring_buffer_bytes: usize,
    pub silence_chunk_bytes: usize,
    /// Largest sequence gap that is backfilled with silence
    pub max_gap_repair: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            force_endian_flip: false,
            ring_buffer_bytes: RING_BUFFER_CAPACITY,
            silence_chunk_bytes: SILENCE_CHUNK_BYTES,
            max_gap_repair: MAX_GAP_REPAIR,
        }
    }
}

/// Where received files live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("com", "udpbridge", "udp-media-bridge")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"));
        Self { data_dir }
    }
}

impl StorageConfig {
    /// Reassembled files, keyed by their original name
    pub fn received_dir(&self) -> PathBuf {
        self.data_dir.join(RECEIVED_DIR_NAME)
    }
}

/// Shared secret prefixed to outbound commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub secret_key: Option<String>,
}

impl SecurityConfig {
    /// Configured key, or a fresh random one
    pub fn resolve_secret(&self) -> String {
        match &self.secret_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => generate_secret(SECRET_KEY_LENGTH),
        }
    }
}

/// Web page served at `/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Replaces the embedded page when set
    pub index_path: Option<PathBuf>,
}

impl AppConfig {
    /// `config.toml` in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "udpbridge", "udp-media-bridge")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path if given, else the default path if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.ring_buffer_bytes == 0 {
            return Err(Error::Config("ring_buffer_bytes must be > 0".into()));
        }
        if audio.silence_chunk_bytes == 0 {
            return Err(Error::Config("silence_chunk_bytes must be > 0".into()));
        }
        if !(1..=8).contains(&audio.channels) {
            return Err(Error::Config(format!("unsupported channel count {}", audio.channels)));
        }
        if ![8, 16, 24, 32].contains(&audio.bits_per_sample) {
            return Err(Error::Config(format!(
                "unsupported bit depth {}",
                audio.bits_per_sample
            )));
        }
        if self.network.control_queue_capacity == 0 {
            return Err(Error::Config("control_queue_capacity must be > 0".into()));
        }

        let net = &self.network;
        let ports = [net.control_port, net.audio_port, net.http_port, net.ws_port];
        for (i, a) in ports.iter().enumerate() {
            if ports[i + 1..].contains(a) {
                return Err(Error::Config(format!("port {} is used twice", a)));
            }
        }
        Ok(())
    }
}

/// Alphanumeric key drawn from v4 UUID randomness
fn generate_secret(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    std::iter::repeat_with(|| *uuid::Uuid::new_v4().as_bytes())
        .flatten()
        .take(len)
        .map(|b| CHARSET[b as usize % CHARSET.len()] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.audio_port, 5004);
        assert_eq!(config.audio.sample_rate, 44100);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [network]
            http_port = 9000

            [audio]
            force_endian_flip = true
            "#,
        )
        .unwrap();
        assert_eq!(config.network.http_port, 9000);
        assert_eq!(config.network.control_port, DEFAULT_CONTROL_PORT);
        assert!(config.audio.force_endian_flip);
        assert_eq!(config.audio.max_gap_repair, MAX_GAP_REPAIR);
    }

    #[test]
    fn duplicate_ports_rejected() {
        let result = AppConfig::from_toml("[network]\nhttp_port = 8090\nws_port = 8090\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn bad_bit_depth_rejected() {
        let result = AppConfig::from_toml("[audio]\nbits_per_sample = 12\n");
        assert!(result.is_err());
    }

    #[test]
    fn secret_is_generated_when_missing() {
        let security = SecurityConfig::default();
        let key = security.resolve_secret();
        assert_eq!(key.len(), SECRET_KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

        let fixed = SecurityConfig { secret_key: Some("abc123".into()) };
        assert_eq!(fixed.resolve_secret(), "abc123");
    }

    #[test]
    fn received_dir_is_under_data_dir() {
        let storage = StorageConfig { data_dir: PathBuf::from("/tmp/bridge") };
        assert_eq!(storage.received_dir(), PathBuf::from("/tmp/bridge/received"));
    }
}
