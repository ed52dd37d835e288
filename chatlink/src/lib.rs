//! # `chatlink`
//!
//! Async client for the intPlatinum chat room protocol: length-prefixed
//! JSON frames over TCP, a version/username handshake, heartbeats and
//! bounded automatic reconnection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatlink::prelude::*;
//!
//! # async fn run() -> chatlink::Result<()> {
//! let (client, mut events) = ChatClient::builder().build()?;
//! client.connect("localhost", 7995, "alice").await?;
//! client.send_text_message("hello").await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Message(ChatEvent::Text { sender, content, .. }) = event {
//!         println!("{sender}: {content}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`common`] - errors, configuration and defaults
//! - [`protocol`] - message model and the framing codec
//! - [`engine`] - the connection engine
//! - [`settings`] - persisted connection settings for front ends

pub mod settings;

// Re-export subcrates
pub use chatlink_common as common;
pub use chatlink_core as engine;
pub use chatlink_protocol as protocol;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::{ChatError, ClientConfig, Result};
    pub use crate::engine::{
        ChatClient, ChatEvent, ClientBuilder, ClientEvent, ConnectionState, EventStream,
        FsObjectStore, MemoryObjectStore, ObjectRef, ObjectStore,
    };
    pub use crate::protocol::{Message, MessageType};
    pub use crate::settings::{JsonSettingsStore, Settings, SettingsStore};
}

// Convenience re-exports at crate root
pub use common::{ChatError, ClientConfig, Result};
pub use engine::{ChatClient, ChatEvent, ClientBuilder, ClientEvent, ConnectionState, EventStream};
pub use settings::{JsonSettingsStore, Settings, SettingsStore};
