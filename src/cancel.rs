//! Cooperative cancellation.
//!
//! Detectors check the signal at frame-loop granularity and abort cleanly;
//! no partial result is stored on cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if the token has been tripped.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blocks (coarsely) until either the token is cancelled or `timeout`
    /// elapses, returning `CancellationTimedOut` in the latter case.
    pub fn wait_for_cancel(&self, timeout: Duration) -> CoreResult<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_cancelled() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(5).min(timeout));
        }
        Err(CoreError::CancellationTimedOut {
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_is_ok_until_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(CoreError::Cancelled)));
    }
}
