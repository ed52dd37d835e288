//! `chatlink` wire protocol
//!
//! Messages are UTF-8 JSON bodies carried in length-prefixed frames over TCP.

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{ChatCodec, Decoded, FramingError};
pub use message::{Message, MessageType, UserInfo};
