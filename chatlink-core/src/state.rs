//! Connection lifecycle state

use std::fmt;

/// Lifecycle of one logical connection. Only the engine moves between
/// these; everything else observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    HandshakingVersion,
    HandshakingUsername,
    Connected,
}

impl ConnectionState {
    /// True while a connect attempt owns the state.
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::HandshakingVersion | Self::HandshakingUsername
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::HandshakingVersion => "handshaking (version)",
            Self::HandshakingUsername => "handshaking (username)",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Where and as whom to connect. Remembered after a successful handshake so
/// the reconnection supervisor can reuse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
        }
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}
