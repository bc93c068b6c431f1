//! Exit-status gate
//!
//! Service data elements like a job's exit code resolve exactly once
//! rather than growing indefinitely. The gate applies the same queuing
//! discipline as the pending read queue (a request that arrives before
//! the value exists waits, with no timeout, for the single resolution
//! event) but never re-enters a pending state: once set, the value is
//! immutable and every queued and future request observes it.

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

use crate::app::queue::ClientId;
use crate::errors::{GateError, GateResult};

/// Waiters and the (at most one) resolved value
#[derive(Debug, Default)]
struct GateState {
    value: Option<i32>,
    waiters: Vec<(ClientId, oneshot::Sender<i32>)>,
}

/// Single-resolution gate for a job's exit status
#[derive(Debug, Default)]
pub struct ExitStatusGate {
    state: Mutex<GateState>,
}

impl ExitStatusGate {
    /// Create an unresolved gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the exit status on behalf of a client
    ///
    /// Returns immediately once the value is set; otherwise suspends
    /// until the job-completion event resolves the gate or the client's
    /// waiters are purged.
    pub async fn get(&self, client: ClientId) -> GateResult<i32> {
        let receiver = {
            let mut state = self.state.lock().await;
            if let Some(value) = state.value {
                return Ok(value);
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push((client, sender));
            debug!("Queued exit-status request for {}", client);
            receiver
        };

        receiver.await.map_err(|_| GateError::Purged)
    }

    /// Resolve the gate with the job's exit status
    ///
    /// Fired by the job-completion notification. All queued requests are
    /// flushed, in arrival order, with the same value. A second
    /// resolution is rejected; the first value stands for the lifetime
    /// of the gate.
    pub async fn set_value(&self, value: i32) -> GateResult<()> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.value {
            return Err(GateError::AlreadyResolved { value: existing });
        }

        state.value = Some(value);
        let waiters = std::mem::take(&mut state.waiters);
        let waiter_count = waiters.len();
        for (_, sender) in waiters {
            let _ = sender.send(value);
        }

        info!(
            "Exit status resolved to {} ({} queued requests flushed)",
            value, waiter_count
        );
        Ok(())
    }

    /// The resolved value, if any, without waiting
    pub async fn value(&self) -> Option<i32> {
        self.state.lock().await.value
    }

    /// Number of requests currently waiting for the resolution
    pub async fn pending_waiters(&self) -> usize {
        self.state.lock().await.waiters.len()
    }

    /// Remove a client's queued requests without resolving them
    pub async fn purge_client(&self, client: ClientId) -> usize {
        let mut state = self.state.lock().await;
        let before = state.waiters.len();
        state.waiters.retain(|(waiter, _)| *waiter != client);
        let removed = before - state.waiters.len();
        if removed > 0 {
            debug!("Purged {} exit-status requests for {}", removed, client);
        }
        removed
    }
}
