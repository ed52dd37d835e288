//! Notifications delivered to the application

use crate::store::ObjectRef;
use tokio::sync::mpsc;
use tracing::trace;

/// A chat message worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Text {
        sender: String,
        content: String,
        /// Epoch milliseconds
        timestamp: i64,
    },
    /// An inbound file. Frames without a decodable payload never become an
    /// event; `reference` is `None` only when the local store failed.
    Image {
        sender: String,
        file_name: String,
        file_type: Option<String>,
        reference: Option<ObjectRef>,
        timestamp: i64,
    },
    System {
        content: String,
        timestamp: i64,
    },
}

/// Everything the engine reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    Message(ChatEvent),
    Error(String),
    /// The server refused our version; carries the version it requires.
    VersionMismatch(String),
}

/// Receiving end handed to the application by [`crate::ClientBuilder::build`].
pub type EventStream = mpsc::UnboundedReceiver<ClientEvent>;

/// Sending end shared by the engine's tasks.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. A dropped receiver is not an error for the engine.
    pub fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!("Event dropped, no receiver: {:?}", e.0);
        }
    }
}
