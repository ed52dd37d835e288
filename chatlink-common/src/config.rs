//! Engine configuration

use crate::constants::{
    CLIENT_VERSION, CONNECT_TIMEOUT_SECS, HEARTBEAT_INTERVAL_SECS, HEARTBEAT_TIMEOUT_FACTOR,
    MAX_FRAME_SIZE, MAX_RECONNECT_ATTEMPTS, OBFUSCATED_NAME_LEN, READ_TIMEOUT_SECS,
    RECONNECT_DELAY_SECS, WRITE_TIMEOUT_SECS,
};
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts, liveness and retry settings for one protocol engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on establishing the TCP connection
    pub connect_timeout: Duration,
    /// Bound on each blocked read, including each handshake reply
    pub read_timeout: Duration,
    /// Bound on writing one frame; a stalled write breaks the connection
    pub write_timeout: Duration,
    /// Time between heartbeats while connected
    pub heartbeat_interval: Duration,
    /// Multiplier applied to `heartbeat_interval` to get the loss deadline
    pub heartbeat_timeout_factor: u32,
    /// Reconnection budget after an unplanned loss
    pub max_reconnect_attempts: u32,
    /// Fixed wait before every reconnection attempt
    pub reconnect_delay: Duration,
    /// Version announced in the handshake
    pub client_version: String,
    /// Largest accepted frame body in bytes
    pub max_frame_size: usize,
    /// Length of the random on-wire file name token
    pub obfuscated_name_len: usize,
}

impl ClientConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(ChatError::Config("connect_timeout must be non-zero".into()));
        }
        if self.read_timeout.is_zero() {
            return Err(ChatError::Config("read_timeout must be non-zero".into()));
        }
        if self.write_timeout.is_zero() {
            return Err(ChatError::Config("write_timeout must be non-zero".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ChatError::Config(
                "heartbeat_interval must be non-zero".into(),
            ));
        }
        if self.heartbeat_timeout_factor == 0 {
            return Err(ChatError::Config(
                "heartbeat_timeout_factor must be at least 1".into(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ChatError::Config("max_frame_size must be non-zero".into()));
        }
        if self.client_version.trim().is_empty() {
            return Err(ChatError::Config("client_version is required".into()));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(WRITE_TIMEOUT_SECS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout_factor: HEARTBEAT_TIMEOUT_FACTOR,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
            client_version: CLIENT_VERSION.to_string(),
            max_frame_size: MAX_FRAME_SIZE,
            obfuscated_name_len: OBFUSCATED_NAME_LEN,
        }
    }
}
