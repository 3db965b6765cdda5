//! Pacing between table checks.

use async_trait::async_trait;
use std::time::Duration;

/// Decides how long to wait before the next table is reconciled.
#[async_trait]
pub trait PacingStrategy: Send + Sync {
    async fn pause(&self);
}

/// Sleep for a fixed duration between tables.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay(Duration::from_secs(1))
    }
}

#[async_trait]
impl PacingStrategy for FixedDelay {
    async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Proceed immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl PacingStrategy for NoDelay {
    async fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_sleeps() {
        let start = Instant::now();
        FixedDelay(Duration::from_millis(1500)).pause().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_returns_immediately() {
        let start = Instant::now();
        NoDelay.pause().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_default_delay_is_one_second() {
        assert_eq!(FixedDelay::default().0, Duration::from_secs(1));
    }
}
