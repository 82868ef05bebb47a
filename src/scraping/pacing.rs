//! Inter-request pacing
//!
//! Enforces a minimum delay between every outbound call, not just between
//! retailers. Scraping ban-sensitive retail endpoints benefits from strict
//! pacing over throughput.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Serializes outbound calls behind a minimum inter-request delay.
///
/// The pacer is shared by every adapter through the HTTP fetcher, so the
/// delay applies across products and across retailers alike.
pub struct Pacer {
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the minimum delay since the previous call has elapsed,
    /// then claim the current slot.
    pub async fn pause(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}
