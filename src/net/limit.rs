//! Per-endpoint call-rate limiting.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// A monotonic-clock rate limiter: each acquisition waits until
/// `last_call + 1/rate` has passed, then records the new call time. The
/// first call goes through without delay.
///
/// Limiters are owned by one session and are not shared globally.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// A limiter allowing `calls_per_second` acquisitions per second.
    /// Zero or negative rates disable limiting.
    pub(crate) fn new(calls_per_second: f64) -> Self {
        let interval = if calls_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / calls_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until a call is allowed, then claim the slot.
    pub(crate) async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let ready_at = {
            let mut last_call = self.last_call.lock().unwrap();
            let now = Instant::now();
            let ready_at = match *last_call {
                Some(last) => (last + self.interval).max(now),
                None => now,
            };
            *last_call = Some(ready_at);
            ready_at
        };
        tokio::time::sleep_until(ready_at).await;
    }
}
