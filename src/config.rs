//! Application configuration
//!
//! Loaded from TOML. Every section falls back to defaults, so a partial
//! file (or none at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use crate::constants;
use crate::error::{Error, Result};
use crate::network::PacketHeader;
use crate::settings::{ColorSettings, DataSettings};

/// Largest UDP payload over IPv4
const MAX_UDP_PAYLOAD: usize = 65_507;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
    pub network: NetworkConfig,
    pub pipeline: PipelineConfig,
    pub capture: CaptureConfig,
    pub color: ColorSettings,
    pub data: DataSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            network: NetworkConfig::default(),
            pipeline: PipelineConfig::default(),
            capture: CaptureConfig::default(),
            color: ColorSettings::default(),
            data: DataSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let net = &self.network;
        if net.interfaces.is_empty() {
            return Err(Error::Config("at least one network interface is required".into()));
        }
        if net.max_datagram_size <= PacketHeader::SIZE || net.max_datagram_size > MAX_UDP_PAYLOAD {
            return Err(Error::Config(format!(
                "max_datagram_size must be in ({}, {}], got {}",
                PacketHeader::SIZE,
                MAX_UDP_PAYLOAD,
                net.max_datagram_size
            )));
        }
        if net.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".into()));
        }
        if self.capture.depth_min_mm > self.capture.depth_max_mm {
            return Err(Error::Config("depth_min_mm exceeds depth_max_mm".into()));
        }
        Ok(())
    }
}

/// Local address one reader binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub address: IpAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// One reader per entry
    pub interfaces: Vec<InterfaceConfig>,
    pub port: u16,
    pub watchdog_timeout_ms: u64,
    pub receive_buffer_size: usize,
    /// Header included
    pub max_datagram_size: usize,
    /// Bounded reader event queue length
    pub event_capacity: usize,
    /// Destination of the frame sender
    pub target: SocketAddr,
    pub send_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interfaces: vec![InterfaceConfig {
                address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            }],
            port: constants::DEFAULT_UDP_PORT,
            watchdog_timeout_ms: constants::DEFAULT_WATCHDOG_TIMEOUT_MS,
            receive_buffer_size: constants::DEFAULT_RECEIVE_BUFFER_SIZE,
            max_datagram_size: constants::MAX_DATAGRAM_SIZE,
            event_capacity: constants::DEFAULT_EVENT_CAPACITY,
            target: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                constants::DEFAULT_UDP_PORT,
            ),
            send_buffer_size: constants::DEFAULT_RECEIVE_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest the decode worker sleeps without a wakeup
    pub idle_wait_ms: u64,
    /// Health turns stale after this long without a decoded frame
    pub stale_after_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_wait_ms: constants::DEFAULT_IDLE_WAIT_MS,
            stale_after_ms: 2_000,
        }
    }
}

/// Synthetic capture mode used by the grabber binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub depth_width: u16,
    pub depth_height: u16,
    pub color_width: u16,
    pub color_height: u16,
    pub fps: u32,
    pub depth_min_mm: u16,
    pub depth_max_mm: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            depth_width: 320,
            depth_height: 288,
            color_width: 320,
            color_height: 288,
            fps: 30,
            depth_min_mm: 300,
            depth_max_mm: 5_000,
        }
    }
}
