use crate::TimeSource;
use core::time::Duration;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A clock that only moves when told to.
///
/// Clones share the same reading, so one handle can drive both a
/// [`Generator`] and the [`MemoryRegistry`] it leases from. Used for
/// deterministic tests and lease-expiry simulations.
///
/// ```
/// use core::time::Duration;
/// use snowlease::{ManualClock, TimeSource};
///
/// let clock = ManualClock::new(100);
/// let other = clock.clone();
/// clock.advance(Duration::from_millis(5));
/// assert_eq!(other.current_millis(), 105);
/// ```
///
/// [`Generator`]: crate::Generator
/// [`MemoryRegistry`]: crate::MemoryRegistry
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis)),
        }
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::Release);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::AcqRel);
    }

    /// Moves the clock backward, saturating at zero.
    pub fn rewind(&self, by: Duration) {
        let by = by.as_millis() as u64;
        let _ = self
            .millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |ms| {
                Some(ms.saturating_sub(by))
            });
    }
}

impl TimeSource for ManualClock {
    fn current_millis(&self) -> u64 {
        self.millis.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewind_saturates() {
        let clock = ManualClock::new(3);
        clock.rewind(Duration::from_millis(5));
        assert_eq!(clock.current_millis(), 0);
    }
}
