//! Receive loop: reads frames, filters liveness traffic, and turns chat
//! messages into [`ChatEvent`]s.

use crate::event::{ChatEvent, ClientEvent, EventSink};
use crate::heartbeat::HeartbeatState;
use crate::outbound::now_millis;
use crate::store::{ObjectRef, ObjectStore};
use crate::transport::FrameReader;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatlink_common::{ChatError, TransportError};
use chatlink_protocol::{Decoded, Message, MessageType};
use futures::StreamExt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, trace, warn};

/// Idle read cycles after which we note that the peer has gone quiet.
const IDLE_CYCLES_HINT: u32 = 3;

const UNKNOWN_SENDER: &str = "Unknown";

/// Why the receive loop returned.
#[derive(Debug)]
pub enum LoopExit {
    /// Local shutdown was requested
    Shutdown,
    /// The connection is gone
    Lost(ChatError),
}

/// What to do with a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Heartbeat traffic; never surfaces
    Discard,
    /// Becomes a [`ChatEvent`]
    Deliver,
    /// Known but not shown; logged only
    Ignore,
}

pub fn route(kind: MessageType) -> Route {
    match kind {
        kind if kind.is_liveness() => Route::Discard,
        MessageType::Text | MessageType::File | MessageType::System => Route::Deliver,
        _ => Route::Ignore,
    }
}

pub struct Dispatcher {
    events: EventSink,
    store: Arc<dyn ObjectStore>,
    heartbeat: Arc<HeartbeatState>,
    read_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        events: EventSink,
        store: Arc<dyn ObjectStore>,
        heartbeat: Arc<HeartbeatState>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            events,
            store,
            heartbeat,
            read_timeout,
        }
    }

    /// Read until shutdown or loss. Each read is bounded by the read
    /// timeout; a timeout is only fatal once the heartbeat deadline passed.
    pub async fn run(
        &self,
        reader: &mut FrameReader,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LoopExit {
        let mut idle_cycles: u32 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => return LoopExit::Shutdown,
                next = timeout(self.read_timeout, reader.next()) => next,
            };

            match next {
                Err(_) => {
                    if self.heartbeat.is_expired(Instant::now()) {
                        let deadline = self.heartbeat.deadline();
                        error!("No heartbeat within {:?}, connection lost", deadline);
                        return LoopExit::Lost(ChatError::HeartbeatTimeout(deadline));
                    }
                    idle_cycles = self.note_idle(idle_cycles);
                }
                Ok(None) => {
                    debug!("Server closed the connection");
                    return LoopExit::Lost(TransportError::Closed.into());
                }
                Ok(Some(Err(e))) => {
                    let err = if e.kind() == io::ErrorKind::UnexpectedEof {
                        TransportError::Closed
                    } else {
                        TransportError::Io(e)
                    };
                    warn!("Read failed: {}", err);
                    return LoopExit::Lost(err.into());
                }
                Ok(Some(Ok(Decoded::Skipped(e)))) => {
                    warn!("Dropped frame: {}", e);
                    idle_cycles = self.note_idle(idle_cycles);
                }
                Ok(Some(Ok(Decoded::Message(message)))) => {
                    idle_cycles = 0;
                    self.dispatch(message).await;
                }
            }
        }
    }

    fn note_idle(&self, cycles: u32) -> u32 {
        let cycles = cycles.saturating_add(1);
        if cycles == IDLE_CYCLES_HINT {
            debug!(
                "No messages for {} read cycles, last heartbeat sent {:?} ago",
                cycles,
                self.heartbeat.last_sent().elapsed()
            );
        }
        cycles
    }

    /// Route one message, emitting an event if it is user-visible.
    pub async fn dispatch(&self, message: Message) {
        match route(message.kind) {
            Route::Discard => trace!("Liveness frame {:?}", message.kind),
            Route::Ignore if message.kind.is_handshake_reply() => {
                warn!("Ignoring {:?} outside the handshake", message.kind);
            }
            Route::Ignore => debug!("Ignoring {:?} message", message.kind),
            Route::Deliver => {
                if let Some(event) = self.to_event(message).await {
                    self.events.emit(ClientEvent::Message(event));
                }
            }
        }
    }

    async fn to_event(&self, message: Message) -> Option<ChatEvent> {
        let timestamp = message.timestamp.unwrap_or_else(now_millis);
        match message.kind {
            MessageType::Text => Some(ChatEvent::Text {
                sender: message.sender.unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
                content: message.content.unwrap_or_default(),
                timestamp,
            }),
            MessageType::System => Some(ChatEvent::System {
                content: message.content.unwrap_or_default(),
                timestamp,
            }),
            MessageType::File => {
                let bytes = decode_payload(&message)?;
                let file_name = display_name(&message, timestamp);
                let reference = self
                    .store_attachment(stored_name(&message, timestamp), bytes)
                    .await;
                Some(ChatEvent::Image {
                    sender: message.sender.unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
                    file_name,
                    file_type: message.file_type,
                    reference,
                    timestamp,
                })
            }
            _ => None,
        }
    }

    async fn store_attachment(&self, name: String, bytes: Vec<u8>) -> Option<ObjectRef> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.put(&name, &bytes)).await {
            Ok(Ok(reference)) => Some(reference),
            Ok(Err(e)) => {
                error!("Failed to store file: {}", e);
                None
            }
            Err(e) => {
                error!("File store task failed: {}", e);
                None
            }
        }
    }
}

/// Raw bytes of a file message, or `None` when there is nothing to show.
fn decode_payload(message: &Message) -> Option<Vec<u8>> {
    let Some(data) = message.file_data.as_deref() else {
        warn!("Dropping file message without payload");
        return None;
    };

    // Some senders wrap base64 at 76 columns.
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match STANDARD.decode(compact) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Dropping file message with undecodable payload: {}", e);
            None
        }
    }
}

/// Name a received file is stored under.
fn stored_name(message: &Message, timestamp: i64) -> String {
    message
        .file_name
        .clone()
        .or_else(|| message.original_file_name.clone())
        .unwrap_or_else(|| format!("image_{timestamp}.jpg"))
}

/// Name shown to the user; prefers the sender's original name.
fn display_name(message: &Message, timestamp: i64) -> String {
    message
        .original_file_name
        .clone()
        .unwrap_or_else(|| stored_name(message, timestamp))
}
