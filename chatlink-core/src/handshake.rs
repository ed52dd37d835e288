//! Two-phase handshake: version negotiation, then username registration
//!
//! Each phase sends one request and waits for exactly one reply, bounded by
//! the read timeout. The engine moves the connection state between phases.

use crate::transport::{FrameReader, FrameWriter};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatlink_common::{ChatError, HandshakeError, Result, TransportError};
use chatlink_protocol::{Decoded, Message, MessageType};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Fallback when a mismatch reply does not say which version it wants.
const UNKNOWN_VERSION: &str = "unknown";

/// How the client version travels on the wire.
pub fn version_token(client_version: &str) -> String {
    STANDARD.encode(client_version.as_bytes())
}

/// Announce `client_version` and wait for the verdict.
pub async fn negotiate_version(
    reader: &mut FrameReader,
    writer: &FrameWriter,
    client_version: &str,
    read_timeout: Duration,
) -> Result<()> {
    debug!("Sending version {}", client_version);
    writer
        .send(&Message::version(version_token(client_version)))
        .await?;

    let reply = await_reply(reader, read_timeout, "version").await?;
    match reply.kind {
        MessageType::VersionAccepted => {
            debug!("Version accepted");
            Ok(())
        }
        MessageType::VersionMismatch => {
            let required_version = reply
                .required_version
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
            warn!("Server requires version {}", required_version);
            Err(ChatError::VersionRejected { required_version })
        }
        other => Err(unexpected("version", other)),
    }
}

/// Register `username` and wait for the server to admit us.
pub async fn register_username(
    reader: &mut FrameReader,
    writer: &FrameWriter,
    username: &str,
    read_timeout: Duration,
) -> Result<()> {
    debug!("Sending username {}", username);
    writer.send(&Message::username(username)).await?;

    let reply = await_reply(reader, read_timeout, "username").await?;
    match reply.kind {
        MessageType::Connected => {
            info!("Registered as {}", username);
            Ok(())
        }
        MessageType::Error => Err(ChatError::UsernameRejected {
            reason: reply.content.unwrap_or_default(),
        }),
        other => Err(unexpected("username", other)),
    }
}

async fn await_reply(
    reader: &mut FrameReader,
    read_timeout: Duration,
    phase: &'static str,
) -> Result<Message> {
    match timeout(read_timeout, reader.next()).await {
        Err(_) | Ok(None) => Err(HandshakeError::NoReply { phase }.into()),
        Ok(Some(Err(e))) => Err(TransportError::Io(e).into()),
        Ok(Some(Ok(Decoded::Skipped(e)))) => Err(HandshakeError::UnexpectedResponse {
            phase,
            got: e.to_string(),
        }
        .into()),
        Ok(Some(Ok(Decoded::Message(message)))) => Ok(message),
    }
}

fn unexpected(phase: &'static str, kind: MessageType) -> ChatError {
    HandshakeError::UnexpectedResponse {
        phase,
        got: format!("{kind:?}"),
    }
    .into()
}
