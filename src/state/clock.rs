//! Monotonic time source for trial measurements.

use tokio::time::Instant;

/// Supplies monotonic timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by the runtime's monotonic [`Instant`], unaffected by wall-clock adjustments.
///
/// Under a paused tokio test runtime this follows the virtual clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
