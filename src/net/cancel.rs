use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, WaybackError};

/// A cooperative cancellation signal.
///
/// Clone a token, hand one copy to a search or memento call, and call
/// [`cancel`](CancelToken::cancel) from anywhere else. The operation checks
/// the token at each suspension point (before requests, between retries,
/// between pages, and per redirect hop) and fails with
/// [`WaybackError::Cancelled`], releasing any in-flight response.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(WaybackError::Cancelled)
        } else {
            Ok(())
        }
    }
}
