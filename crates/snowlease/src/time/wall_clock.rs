use crate::{CUSTOM_EPOCH, TimeSource};
use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reads the system wall clock on every call.
///
/// Unlike [`MonotonicClock`], this follows NTP steps and manual adjustments,
/// so it can move backward. Readings before the epoch saturate to zero.
///
/// [`MonotonicClock`]: crate::MonotonicClock
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    epoch: Duration,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::with_epoch(CUSTOM_EPOCH)
    }
}

impl WallClock {
    pub const fn with_epoch(epoch: Duration) -> Self {
        Self { epoch }
    }

    pub const fn epoch(&self) -> Duration {
        self.epoch
    }
}

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_sub(self.epoch)
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_epoch_saturates_to_zero() {
        let clock = WallClock::with_epoch(Duration::from_secs(u32::MAX as u64 * 100));
        assert_eq!(clock.current_millis(), 0);
    }

    #[test]
    fn custom_epoch_is_recent() {
        let ms = WallClock::default().current_millis();
        assert!(ms > 0);
        // 41 bits of milliseconds last roughly 69 years.
        assert!(ms < (1 << 41));
    }
}
