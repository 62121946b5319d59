use core::time::Duration;

use crate::{Error, LeaseSnowflakeId, Result, SlotOrder, SnowflakeId, WorkerKeyFormat};

/// Tunables for lease acquisition and renewal.
///
/// The defaults match a 10-bit worker field: 1024 slots, a 12 s lease renewed
/// every 10 s.
///
/// ```
/// use core::time::Duration;
/// use snowlease::{GeneratorConfig, LeaseSnowflakeId};
///
/// let config = GeneratorConfig::default()
///     .with_max_workers(64)
///     .with_lease_ttl(Duration::from_secs(30))
///     .with_safety_margin(Duration::from_secs(5));
///
/// config.validate::<LeaseSnowflakeId>().unwrap();
/// assert_eq!(config.keepalive_period(), Duration::from_secs(25));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Number of candidate slots, `0..max_workers`. Must fit the layout's
    /// worker field.
    pub max_workers: u64,
    /// Lifetime of a lease without renewal.
    pub lease_ttl: Duration,
    /// How long before expiry each renewal happens. The keepalive period is
    /// `lease_ttl - safety_margin`.
    pub safety_margin: Duration,
    /// Upper bound on a single registry call.
    pub registry_timeout: Duration,
    /// Acquisition attempts made while constructing a generator.
    pub acquire_attempts: u32,
    /// Pause between construction attempts.
    pub acquire_backoff: Duration,
    pub key_format: WorkerKeyFormat,
    pub slot_order: SlotOrder,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_workers: LeaseSnowflakeId::max_workers(),
            lease_ttl: Duration::from_secs(12),
            safety_margin: Duration::from_secs(2),
            registry_timeout: Duration::from_secs(1),
            acquire_attempts: 3,
            acquire_backoff: Duration::from_millis(100),
            key_format: WorkerKeyFormat::default(),
            slot_order: SlotOrder::Ascending,
        }
    }
}

impl GeneratorConfig {
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: u64) -> Self {
        self.max_workers = max_workers;
        self
    }

    #[must_use]
    pub fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }

    #[must_use]
    pub fn with_safety_margin(mut self, safety_margin: Duration) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    #[must_use]
    pub fn with_registry_timeout(mut self, registry_timeout: Duration) -> Self {
        self.registry_timeout = registry_timeout;
        self
    }

    #[must_use]
    pub fn with_acquire_attempts(mut self, acquire_attempts: u32) -> Self {
        self.acquire_attempts = acquire_attempts;
        self
    }

    #[must_use]
    pub fn with_acquire_backoff(mut self, acquire_backoff: Duration) -> Self {
        self.acquire_backoff = acquire_backoff;
        self
    }

    #[must_use]
    pub fn with_key_format(mut self, key_format: WorkerKeyFormat) -> Self {
        self.key_format = key_format;
        self
    }

    #[must_use]
    pub fn with_slot_order(mut self, slot_order: SlotOrder) -> Self {
        self.slot_order = slot_order;
        self
    }

    /// Interval between keepalive ticks.
    pub fn keepalive_period(&self) -> Duration {
        self.lease_ttl.saturating_sub(self.safety_margin)
    }

    /// Checks the configuration against the ID layout `ID`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when:
    /// - `max_workers` is zero or exceeds `ID::max_workers()`,
    /// - the lease TTL is below one millisecond,
    /// - `safety_margin` is not strictly inside `(0, lease_ttl)`,
    /// - `registry_timeout` is zero or not below `safety_margin`, since a
    ///   renewal that slow would land past the local lease deadline,
    /// - `acquire_attempts` is zero.
    pub fn validate<ID: SnowflakeId>(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::InvalidConfig { reason });

        if self.max_workers == 0 {
            return invalid("max_workers must be at least 1".into());
        }
        if self.max_workers > ID::max_workers() {
            return invalid(format!(
                "max_workers {} exceeds the {}-bit worker field ({} ids)",
                self.max_workers,
                ID::MACHINE_ID_BITS,
                ID::max_workers()
            ));
        }
        if self.lease_ttl < Duration::from_millis(1) {
            return invalid("lease_ttl must be at least 1ms".into());
        }
        if self.safety_margin.is_zero() || self.safety_margin >= self.lease_ttl {
            return invalid(format!(
                "safety_margin {:?} must be positive and below lease_ttl {:?}",
                self.safety_margin, self.lease_ttl
            ));
        }
        if self.registry_timeout.is_zero() || self.registry_timeout >= self.safety_margin {
            return invalid(format!(
                "registry_timeout {:?} must be positive and below safety_margin {:?}",
                self.registry_timeout, self.safety_margin
            ));
        }
        if self.acquire_attempts == 0 {
            return invalid("acquire_attempts must be at least 1".into());
        }
        Ok(())
    }
}
