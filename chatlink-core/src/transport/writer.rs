//! Serialized frame writer shared by every sender of one connection

use super::BoxedWriter;
use chatlink_common::{ChatError, Result, TransportError};
use chatlink_protocol::{ChatCodec, Message};
use futures::SinkExt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

/// Bound on flushing and shutting down the write half on close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound on waiting for the lock, and separately on writing one frame.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the write half. A frame is written and flushed while the lock is
/// held, so frames from concurrent senders never interleave.
///
/// A write that stalls past the write timeout may have left part of a frame
/// on the wire, so the writer refuses every later send.
pub struct FrameWriter {
    sink: Mutex<FramedWrite<BoxedWriter, ChatCodec>>,
    write_timeout: Duration,
    broken: AtomicBool,
}

impl FrameWriter {
    pub fn new(writer: BoxedWriter, codec: ChatCodec) -> Self {
        Self {
            sink: Mutex::new(FramedWrite::new(writer, codec)),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            broken: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Encode, write and flush one message within the write timeout.
    pub async fn send(&self, message: &Message) -> Result<()> {
        if self.is_broken() {
            return Err(ChatError::Transport(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "writer unusable after a stalled write",
            ))));
        }

        let stalled = || {
            ChatError::Transport(TransportError::WriteTimeout(self.write_timeout))
        };

        let mut sink = timeout(self.write_timeout, self.sink.lock())
            .await
            .map_err(|_| stalled())?;

        match timeout(self.write_timeout, sink.send(message)).await {
            Ok(result) => result.map_err(|e| ChatError::Transport(TransportError::Io(e))),
            Err(_) => {
                self.broken.store(true, Ordering::SeqCst);
                warn!("Write stalled for {:?}", self.write_timeout);
                Err(stalled())
            }
        }
    }

    /// Flush and shut down the write half. Errors are logged, not returned.
    pub async fn close(&self) {
        let result = timeout(CLOSE_TIMEOUT, async {
            let mut sink = self.sink.lock().await;
            SinkExt::<&Message>::close(&mut *sink).await
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Error closing writer: {}", e),
            Err(_) => debug!("Timed out closing writer"),
        }
    }
}
