//! Default values shared by the engine, the facade and the CLI.
//!
//! Use these constants instead of magic numbers so defaults stay consistent
//! across crates.

/// Version string announced during the handshake (sent base64-encoded).
pub const CLIENT_VERSION: &str = "1.0.0-mv";

/// Default chat server port.
pub const DEFAULT_SERVER_PORT: u16 = 7995;

/// Default chat server host.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// TCP connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout in seconds. Also bounds each handshake round-trip.
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Bound on writing one frame, in seconds. A peer that stops reading
/// stalls writes once the socket buffers are full.
pub const WRITE_TIMEOUT_SECS: u64 = 10;

/// Largest accepted frame body in bytes (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Heartbeat interval in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Silence longer than `HEARTBEAT_TIMEOUT_FACTOR * heartbeat interval` since the
/// last heartbeat was sent is treated as connection loss.
pub const HEARTBEAT_TIMEOUT_FACTOR: u32 = 3;

/// Maximum consecutive reconnection attempts after an unplanned loss.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Fixed delay before each reconnection attempt, in seconds.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Length of the random token used for on-wire file names.
pub const OBFUSCATED_NAME_LEN: usize = 8;
