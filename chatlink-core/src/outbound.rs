//! Builders for client-originated chat messages

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatlink_protocol::{constants::FILE_TYPE_IMAGES, Message, MessageType};
use rand::Rng;

/// Wall clock in epoch milliseconds.
pub fn now_millis() -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    ms
}

/// `len` random lowercase ASCII letters.
pub fn random_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Text after the last `.`, if non-empty.
pub fn file_extension(name: &str) -> Option<&str> {
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// Random on-wire name that keeps the original extension, so the real file
/// name never appears in `file_name`.
pub fn obfuscated_file_name<R: Rng + ?Sized>(rng: &mut R, original: &str, len: usize) -> String {
    let token = random_token(rng, len);
    match file_extension(original) {
        Some(ext) => format!("{token}.{ext}"),
        None => token,
    }
}

pub fn text_message(content: &str, timestamp: i64) -> Message {
    Message::text(content, timestamp)
}

/// A `file` message carrying `bytes` as base64 under an already obfuscated
/// `wire_name`.
pub fn file_message(
    original_name: &str,
    wire_name: String,
    file_type: &str,
    bytes: &[u8],
    timestamp: i64,
) -> Message {
    Message {
        file_type: Some(file_type.to_string()),
        file_name: Some(wire_name),
        original_file_name: Some(original_name.to_string()),
        file_data: Some(STANDARD.encode(bytes)),
        timestamp: Some(timestamp),
        ..Message::new(MessageType::File)
    }
}

pub fn image_message(original_name: &str, wire_name: String, bytes: &[u8], timestamp: i64) -> Message {
    file_message(original_name, wire_name, FILE_TYPE_IMAGES, bytes, timestamp)
}
