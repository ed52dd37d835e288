//! Outbound heartbeat and the liveness deadline derived from it

use crate::outbound::now_millis;
use crate::transport::FrameWriter;
use chatlink_protocol::Message;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Tracks when we last sent anything heartbeat-worthy. The receive loop
/// declares the link dead once `deadline` has passed since then.
#[derive(Debug)]
pub struct HeartbeatState {
    interval: Duration,
    deadline: Duration,
    last_sent: Mutex<Instant>,
}

impl HeartbeatState {
    /// Starts the clock now, i.e. when the connection becomes usable.
    pub fn new(interval: Duration, timeout_factor: u32) -> Self {
        Self {
            interval,
            deadline: interval.saturating_mul(timeout_factor),
            last_sent: Mutex::new(Instant::now()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn record_sent(&self) {
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last_sent(&self) -> Instant {
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_sent()) > self.deadline
    }
}

/// Send a heartbeat every interval until `shutdown` fires. A failed send is
/// only logged; the receive loop owns loss detection.
pub async fn run(
    state: Arc<HeartbeatState>,
    writer: Arc<FrameWriter>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + state.interval(), state.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!("Heartbeat stopped");
                return;
            }
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    return;
                }
                let heartbeat = Message::heartbeat(now_millis());
                // A peer that stops reading stalls the send; shutdown must
                // still win.
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        debug!("Heartbeat stopped during send");
                        return;
                    }
                    result = writer.send(&heartbeat) => match result {
                        Ok(()) => {
                            state.record_sent();
                            debug!("Sent heartbeat");
                        }
                        Err(e) => warn!("Failed to send heartbeat: {}", e),
                    },
                }
            }
        }
    }
}
