//! Configuration for storegate
//!
//! Centralized configuration with sensible defaults. Any subset of the
//! fields can be loaded from a TOML file; missing keys keep their defaults.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GateError, Result};
use crate::protocol::HEADER_SIZE;

/// Default UDP port of the protocol
pub const DEFAULT_PORT: u16 = 5683;

/// Main configuration shared by the server and client binaries
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// UDP bind address of the server (all interfaces by default)
    pub listen_addr: String,

    /// Maximum number of customers allowed inside at once
    pub max_capacity: usize,

    /// How long a single receive blocks before re-checking shutdown (milliseconds)
    pub recv_poll_ms: u64,

    /// Receive buffer size; larger datagrams are truncated by the OS
    pub recv_buffer_size: usize,

    /// How request paths are matched against the route table
    pub route_matching: RouteMatching,

    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// Address of the server the access point talks to
    pub server_addr: String,

    /// Entry request deadline (milliseconds)
    pub entry_timeout_ms: u64,

    /// Exit notification deadline, per attempt (milliseconds)
    pub exit_timeout_ms: u64,

    /// Upper bound of a single transport poll while waiting (milliseconds)
    pub response_poll_ms: u64,

    /// How long the connectivity probe waits for a reply (milliseconds)
    pub probe_wait_ms: u64,

    /// How long the door stays open (milliseconds)
    pub door_dwell_ms: u64,

    /// Half-period of a denial blink (milliseconds)
    pub blink_ms: u64,
}

/// Path matching policy of the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMatching {
    /// Normalised segment list must equal the route exactly
    #[default]
    Exact,

    /// Case-insensitive substring anywhere in the path
    Legacy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_capacity: 10,
            recv_poll_ms: 1000,
            recv_buffer_size: 1024,
            route_matching: RouteMatching::Exact,
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            entry_timeout_ms: 5000,
            exit_timeout_ms: 3000,
            response_poll_ms: 500,
            probe_wait_ms: 2000,
            door_dwell_ms: 5000,
            blink_ms: 200,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| GateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file on top of the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the server or client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(GateError::Config("max_capacity must be at least 1".into()));
        }
        if self.recv_buffer_size < HEADER_SIZE {
            return Err(GateError::Config(format!(
                "recv_buffer_size must be at least {} bytes",
                HEADER_SIZE
            )));
        }
        let timeouts = [
            ("recv_poll_ms", self.recv_poll_ms),
            ("entry_timeout_ms", self.entry_timeout_ms),
            ("exit_timeout_ms", self.exit_timeout_ms),
            ("response_poll_ms", self.response_poll_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(GateError::Config(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    pub fn recv_poll(&self) -> Duration {
        Duration::from_millis(self.recv_poll_ms)
    }

    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    pub fn response_poll(&self) -> Duration {
        Duration::from_millis(self.response_poll_ms)
    }

    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }

    pub fn door_dwell(&self) -> Duration {
        Duration::from_millis(self.door_dwell_ms)
    }

    pub fn blink(&self) -> Duration {
        Duration::from_millis(self.blink_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from an existing config (e.g. one loaded from a file)
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the UDP bind address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the store capacity
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.config.max_capacity = capacity;
        self
    }

    /// Set the server receive poll interval (in milliseconds)
    pub fn recv_poll_ms(mut self, ms: u64) -> Self {
        self.config.recv_poll_ms = ms;
        self
    }

    /// Set the receive buffer size (in bytes)
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Set the path matching policy
    pub fn route_matching(mut self, matching: RouteMatching) -> Self {
        self.config.route_matching = matching;
        self
    }

    /// Set the server address used by the client
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the entry request timeout (in milliseconds)
    pub fn entry_timeout_ms(mut self, ms: u64) -> Self {
        self.config.entry_timeout_ms = ms;
        self
    }

    /// Set the per-attempt exit notification timeout (in milliseconds)
    pub fn exit_timeout_ms(mut self, ms: u64) -> Self {
        self.config.exit_timeout_ms = ms;
        self
    }

    /// Set the client poll slice (in milliseconds)
    pub fn response_poll_ms(mut self, ms: u64) -> Self {
        self.config.response_poll_ms = ms;
        self
    }

    /// Set the connectivity probe wait (in milliseconds)
    pub fn probe_wait_ms(mut self, ms: u64) -> Self {
        self.config.probe_wait_ms = ms;
        self
    }

    /// Set the door dwell time (in milliseconds)
    pub fn door_dwell_ms(mut self, ms: u64) -> Self {
        self.config.door_dwell_ms = ms;
        self
    }

    /// Set the denial blink half-period (in milliseconds)
    pub fn blink_ms(mut self, ms: u64) -> Self {
        self.config.blink_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
