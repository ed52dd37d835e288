//! Plain TCP transport

use super::socket_tuning::configure_socket_silent;
use chatlink_common::TransportError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

/// Resolve `host` and connect to the first address that accepts, all within
/// `connect_timeout`.
pub async fn connect(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let addr = format!("{host}:{port}");

    let stream = timeout(connect_timeout, connect_any(host, port, &addr))
        .await
        .map_err(|_| TransportError::Timeout(addr.clone()))??;

    configure_socket_silent(&stream);
    debug!("TCP connection established to {}", addr);
    Ok(stream)
}

async fn connect_any(host: &str, port: u16, addr: &str) -> Result<TcpStream, TransportError> {
    let candidates: Vec<SocketAddr> = match lookup_host((host, port)).await {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            debug!("DNS lookup for {} failed: {}", host, e);
            return Err(TransportError::UnresolvedHost(host.to_string()));
        }
    };

    let mut last_err: Option<io::Error> = None;
    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", candidate, e);
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(TransportError::from_connect(e, addr)),
        None => Err(TransportError::UnresolvedHost(host.to_string())),
    }
}
