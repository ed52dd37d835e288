//! Error types for `chatlink`

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for `chatlink` operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// Transport could not be established or failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered the handshake with something unexpected
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// The server refused our client version
    #[error("Client version rejected, server requires {required_version}")]
    VersionRejected { required_version: String },

    /// The server refused the chosen username
    #[error("Username rejected: {reason}")]
    UsernameRejected { reason: String },

    /// Nothing was heard within the heartbeat deadline
    #[error("Heartbeat timeout after {0:?}")]
    HeartbeatTimeout(Duration),

    /// Automatic reconnection gave up
    #[error("Connection lost, reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// Operation requires an established connection
    #[error("Not connected")]
    NotConnected,

    /// Another connect attempt is still running
    #[error("A connect attempt is already in progress")]
    ConnectInProgress,

    /// Connect called on a live connection
    #[error("Already connected")]
    AlreadyConnected,

    /// The attempt was superseded by a manual disconnect
    #[error("Cancelled by disconnect")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File to send does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Local object store failed
    #[error("Object store error: {0}")]
    Store(String),

    /// IO error outside the transport (files, settings)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error outside the wire codec (settings)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while opening or using the TCP transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("connection refused by {0}")]
    Refused(String),

    #[error("could not resolve host {0}")]
    UnresolvedHost(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("write stalled for {0:?}")]
    WriteTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Classify an error returned by a connect call to `addr`.
    pub fn from_connect(err: std::io::Error, addr: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Self::Refused(addr.to_string()),
            std::io::ErrorKind::TimedOut => Self::Timeout(addr.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Handshake failures other than an explicit version or username rejection
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("unexpected response during {phase} phase: {got}")]
    UnexpectedResponse { phase: &'static str, got: String },

    #[error("no response during {phase} phase")]
    NoReply { phase: &'static str },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ChatError>;
