//! Bounded, fixed-delay reconnection after an unplanned loss

use crate::state::ConnectionParams;
use chatlink_common::{ChatError, Result};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Remembers the last good connection parameters and how many automatic
/// attempts have been spent since then.
#[derive(Debug)]
pub struct ReconnectManager {
    params: Option<ConnectionParams>,
    attempts: u32,
    max_attempts: u32,
}

impl ReconnectManager {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            params: None,
            attempts: 0,
            max_attempts,
        }
    }

    /// A handshake completed: remember where, and refill the budget.
    pub fn on_connected(&mut self, params: ConnectionParams) {
        self.params = Some(params);
        self.attempts = 0;
    }

    /// Manual disconnect: no automatic attempt may follow.
    pub fn suppress(&mut self) {
        self.params = None;
        self.attempts = self.max_attempts;
    }

    /// Parameters for the next attempt, or `None` if reconnection is
    /// suppressed or the budget is spent.
    pub fn next_params(&self) -> Option<ConnectionParams> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.params.clone()
    }

    /// Count a failed attempt; returns the attempts spent so far.
    pub fn on_failed(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    pub fn is_suppressed(&self) -> bool {
        self.params.is_none()
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// How a supervision run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorOutcome {
    /// Attempt number `attempt` succeeded
    Reconnected { attempt: u32 },
    /// Every attempt in the budget failed
    Exhausted { attempts: u32 },
    /// Reconnection was turned off, or another connect took over
    Suppressed,
}

fn lock(manager: &Mutex<ReconnectManager>) -> MutexGuard<'_, ReconnectManager> {
    manager.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait `delay`, try `attempt`, and repeat until it succeeds, the budget is
/// spent, or reconnection is suppressed.
///
/// Attempts run one after another; the next delay starts only after the
/// previous attempt finished. Cancel by dropping the future.
pub async fn supervise<F, Fut>(
    manager: &Mutex<ReconnectManager>,
    delay: Duration,
    mut attempt: F,
) -> SupervisorOutcome
where
    F: FnMut(ConnectionParams) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        if lock(manager).next_params().is_none() {
            return SupervisorOutcome::Suppressed;
        }

        sleep(delay).await;

        let (params, number, max) = {
            let manager = lock(manager);
            match manager.next_params() {
                Some(params) => (params, manager.attempts() + 1, manager.max_attempts()),
                None => return SupervisorOutcome::Suppressed,
            }
        };

        info!("Reconnecting to {} (attempt {}/{})", params, number, max);
        match attempt(params).await {
            Ok(()) => {
                info!("Reconnected on attempt {}", number);
                return SupervisorOutcome::Reconnected { attempt: number };
            }
            Err(
                ChatError::AlreadyConnected | ChatError::ConnectInProgress | ChatError::Cancelled,
            ) => {
                info!("Reconnection superseded by another connect");
                return SupervisorOutcome::Suppressed;
            }
            Err(e) => {
                let mut manager = lock(manager);
                if manager.is_suppressed() {
                    return SupervisorOutcome::Suppressed;
                }
                let spent = manager.on_failed();
                warn!("Reconnect attempt {} failed: {}", spent, e);
                if manager.is_exhausted() {
                    return SupervisorOutcome::Exhausted { attempts: spent };
                }
            }
        }
    }
}
