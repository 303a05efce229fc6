//! Client-side request spacing
//!
//! Binance weights requests per IP; spacing calls by a fixed minimum interval
//! keeps a single process comfortably below the limits.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between consecutive requests. Clones share the same clock.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request slot is available and claim it
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready = prev + self.min_interval;
            if ready > Instant::now() {
                sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spacing_between_requests() {
        let throttle = Throttle::new(Duration::from_millis(40));
        let start = std::time::Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.clone().wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(10));
        let start = std::time::Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
