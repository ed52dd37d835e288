//! Protocol constants

/// Size of the big-endian length prefix
pub const HEADER_LEN: usize = 4;

/// Maximum frame body size (1MB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// `file_type` used for image payloads
pub const FILE_TYPE_IMAGES: &str = "images";

/// Content carried by outbound heartbeats
pub const HEARTBEAT_CONTENT: &str = "ping";
