//! Common utilities and types for `chatlink`

pub mod config;
pub mod constants;
pub mod error;

pub use config::ClientConfig;
pub use constants::{
    CLIENT_VERSION, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, MAX_RECONNECT_ATTEMPTS,
};
pub use error::{ChatError, HandshakeError, Result, TransportError};
