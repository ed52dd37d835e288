//! Protocol engine for the chatlink chat client.
//!
//! [`ChatClient`] owns one logical connection: it opens the transport, runs
//! the version/username handshake, then drives a receive loop and a
//! heartbeat task until the connection is closed or lost. Unplanned losses
//! are handed to a bounded reconnection supervisor.

pub mod address;
pub mod client;
pub mod dispatcher;
pub mod event;
pub mod handshake;
pub mod heartbeat;
pub mod outbound;
pub mod reconnect;
pub mod state;
pub mod store;
pub mod transport;

pub use client::{ChatClient, ClientBuilder};
pub use event::{ChatEvent, ClientEvent, EventStream};
pub use state::{ConnectionParams, ConnectionState};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectRef, ObjectStore};
