//! Protocol message definitions

use crate::constants::HEARTBEAT_CONTENT;
use serde::{Deserialize, Serialize};

/// Discriminant carried in the `type` field of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Chat traffic (server -> client, text/file also client -> server)
    Text,
    File,
    System,
    UserList,

    // Handshake replies (server -> client)
    Connected,
    Error,
    VersionAccepted,
    VersionMismatch,

    // Handshake requests (client -> server)
    Version,
    Username,

    // Liveness (either direction)
    Heartbeat,
    Pong,

    /// Polite goodbye sent before a manual close
    Disconnect,

    /// Any type this client does not know about
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Heartbeat and pong frames only prove liveness.
    pub fn is_liveness(self) -> bool {
        matches!(self, Self::Heartbeat | Self::Pong)
    }

    /// Replies that only make sense while handshaking.
    pub fn is_handshake_reply(self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Error | Self::VersionAccepted | Self::VersionMismatch
        )
    }
}

/// An online user as reported in `user_list` messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Wire message. Which optional fields are populated depends on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Epoch milliseconds
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize"
    )]
    pub timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    /// Obfuscated on-wire name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Human-readable name for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,

    /// Base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserInfo>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
}

impl Message {
    /// A message of the given type with every optional field empty.
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            sender: None,
            content: None,
            timestamp: None,
            file_type: None,
            file_name: None,
            original_file_name: None,
            file_data: None,
            users: None,
            username: None,
            version: None,
            required_version: None,
        }
    }

    pub fn text(content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            content: Some(content.into()),
            timestamp: Some(timestamp),
            ..Self::new(MessageType::Text)
        }
    }

    /// Version announcement; `token` is the already-encoded client version.
    pub fn version(token: impl Into<String>) -> Self {
        Self {
            version: Some(token.into()),
            ..Self::new(MessageType::Version)
        }
    }

    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::new(MessageType::Username)
        }
    }

    pub fn heartbeat(timestamp: i64) -> Self {
        Self {
            content: Some(HEARTBEAT_CONTENT.to_string()),
            timestamp: Some(timestamp),
            ..Self::new(MessageType::Heartbeat)
        }
    }

    pub fn disconnect(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::new(MessageType::Disconnect)
        }
    }
}

/// Accepts integer epoch milliseconds or fractional epoch seconds; some
/// servers stamp messages with float seconds.
mod timestamp {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Seconds(f64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
            Raw::Millis(ms) => ms,
            Raw::Seconds(secs) => (secs * 1000.0).round() as i64,
        }))
    }
}
