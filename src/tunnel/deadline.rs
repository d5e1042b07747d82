use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{Stage, TunnelError};

/// A point in time combined with a caller's cancellation token.
///
/// One `Deadline` is created per `start()` and threaded through every wait
/// so that process output, registry calls and polling all stop together.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    cancel: CancellationToken,
}

impl Deadline {
    pub fn after(budget: Duration, cancel: CancellationToken) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            cancel,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the time is up or the token is cancelled.
    pub async fn expired(&self) {
        tokio::select! {
            _ = tokio::time::sleep_until(self.at) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// The error to report after [`Deadline::expired`] fired while waiting on `stage`.
    pub fn error(&self, stage: Stage) -> TunnelError {
        if self.cancel.is_cancelled() {
            TunnelError::Cancelled { stage }
        } else {
            TunnelError::TimedOut {
                stage,
                timeout: self.budget,
            }
        }
    }
}
