//! Clock sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// A monotonic clock measured from an arbitrary origin.
///
/// Time is a [`Duration`] since the origin rather than an `Instant`, so a
/// virtual clock can start at zero and report exactly what a test set.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

// ---------------------------------------------------------------------------
// TokioClock
// ---------------------------------------------------------------------------

/// Real time, read from tokio's clock.
///
/// Going through `tokio::time::Instant` means a runtime started with
/// `start_paused` controls this clock too.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Starts a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Converts a time on this clock back into an `Instant`, for
    /// `tokio::time::sleep_until`.
    pub fn instant_at(&self, at: Duration) -> Instant {
        self.origin + at
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// A clock standing at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(as_nanos(by), Ordering::SeqCst);
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, at: Duration) {
        self.nanos.store(as_nanos(at), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_starts_at_zero() {
        assert_eq!(ManualClock::new().now(), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_advance_accumulates() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(3));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_millis(3500));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.set(Duration::from_secs(42));
        assert_eq!(clock.now(), Duration::from_secs(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.now(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_instant_at_round_trips() {
        let clock = TokioClock::new();
        let deadline = clock.instant_at(Duration::from_secs(6));

        tokio::time::sleep_until(deadline).await;
        assert_eq!(clock.now(), Duration::from_secs(6));
    }
}
