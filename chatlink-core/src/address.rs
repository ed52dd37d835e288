//! Server address normalisation
//!
//! Users paste anything from `chat.example.com` to
//! `http://chat.example.com:8000/room`. Only hosts that carry a scheme are
//! picked apart; a bare host is used as-is after trimming.

/// Normalise a user-supplied host and port.
///
/// With a `scheme://` prefix the scheme and any path are dropped, and a
/// valid embedded port (1..=65535) overrides `port`.
pub fn normalize(host: &str, port: u16) -> (String, u16) {
    let host = host.trim();

    let Some((_, rest)) = host.split_once("://") else {
        return (host.to_string(), port);
    };

    let authority = rest.split_once('/').map_or(rest, |(authority, _)| authority);

    match authority.split_once(':') {
        Some((name, embedded)) => {
            let port = embedded
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .unwrap_or(port);
            (name.to_string(), port)
        }
        None => (authority.to_string(), port),
    }
}
