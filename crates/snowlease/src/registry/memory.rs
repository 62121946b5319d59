use core::time::Duration;
use std::collections::HashMap;

use portable_atomic::{AtomicBool, AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{LeaseRegistry, RegistryError, TimeSource, mutex::Mutex};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: u64,
}

/// An in-process expiring key/value store.
///
/// Expiry is evaluated lazily against the injected [`TimeSource`], so a
/// [`ManualClock`] shared with several generators lets tests simulate lease
/// lapses without waiting. Each operation runs under one lock, which gives
/// the atomic create-if-absent semantics the protocol requires.
///
/// [`set_available`] and [`set_latency`] inject store outages and slow
/// replies.
///
/// [`ManualClock`]: crate::ManualClock
/// [`set_available`]: MemoryRegistry::set_available
/// [`set_latency`]: MemoryRegistry::set_latency
#[derive(Debug)]
pub struct MemoryRegistry<T: TimeSource> {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    time: T,
}

impl<T: TimeSource> MemoryRegistry<T> {
    pub fn new(time: T) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            time,
        }
    }

    /// While `false`, every operation fails with
    /// [`RegistryError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Delays every reply by `latency` on the tokio timer.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Release);
    }

    /// Returns the unexpired value stored under `key`.
    pub fn holder(&self, key: &str) -> Option<String> {
        let now = self.time.current_millis();
        self.with_entries(|entries| {
            entries
                .get(key)
                .filter(|entry| entry.expires_at > now)
                .map(|entry| entry.value.clone())
        })
        .ok()
        .flatten()
    }

    /// Deletes `key` regardless of its holder, as a store-side eviction would.
    pub fn evict(&self, key: &str) -> bool {
        self.with_entries(|entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Number of unexpired leases.
    pub fn live_leases(&self) -> usize {
        let now = self.time.current_millis();
        self.with_entries(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    fn with_entries<F, O>(&self, f: F) -> Result<O, RegistryError>
    where
        F: FnOnce(&mut HashMap<String, Entry>) -> O,
    {
        #[cfg(feature = "parking-lot")]
        let mut entries = self.entries.lock();
        #[cfg(not(feature = "parking-lot"))]
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| RegistryError::unavailable("registry lock poisoned"))?;
        Ok(f(&mut *entries))
    }

    async fn round_trip(&self) -> Result<(), RegistryError> {
        let latency = self.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RegistryError::unavailable("connection refused"))
        }
    }
}

impl<T: TimeSource + Send + Sync> LeaseRegistry for MemoryRegistry<T> {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    async fn try_acquire(
        &self,
        key: &str,
        identity: &str,
        ttl: Duration,
    ) -> Result<bool, RegistryError> {
        self.round_trip().await?;
        let now = self.time.current_millis();
        self.with_entries(|entries| {
            if entries.get(key).is_some_and(|entry| entry.expires_at > now) {
                return false;
            }
            entries.insert(
                key.to_owned(),
                Entry {
                    value: identity.to_owned(),
                    expires_at: now + ttl.as_millis() as u64,
                },
            );
            true
        })
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    async fn renew_and_check(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<String>, RegistryError> {
        self.round_trip().await?;
        let now = self.time.current_millis();
        self.with_entries(|entries| match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + ttl.as_millis() as u64;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    const TTL: Duration = Duration::from_secs(12);

    #[tokio::test]
    async fn create_if_absent_is_exclusive() {
        let registry = MemoryRegistry::new(ManualClock::new(0));
        assert!(registry.try_acquire("k", "a", TTL).await.unwrap());
        assert!(!registry.try_acquire("k", "b", TTL).await.unwrap());
        assert_eq!(registry.holder("k").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn stale_entry_is_overwritten_by_next_acquire() {
        let clock = ManualClock::new(0);
        let registry = MemoryRegistry::new(clock.clone());
        assert!(registry.try_acquire("k", "a", TTL).await.unwrap());

        clock.advance(Duration::from_secs(11));
        assert!(!registry.try_acquire("k", "b", TTL).await.unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(registry.try_acquire("k", "b", TTL).await.unwrap());
        assert_eq!(registry.holder("k").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn renew_extends_and_reports_holder() {
        let clock = ManualClock::new(0);
        let registry = MemoryRegistry::new(clock.clone());
        registry.try_acquire("k", "a", TTL).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(
            registry.renew_and_check("k", TTL).await.unwrap().as_deref(),
            Some("a")
        );

        // 20s after creation, but only 10s after the renewal.
        clock.advance(Duration::from_secs(10));
        assert_eq!(registry.holder("k").as_deref(), Some("a"));
        assert!(!registry.try_acquire("k", "b", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn renew_of_expired_key_reports_absent() {
        let clock = ManualClock::new(0);
        let registry = MemoryRegistry::new(clock.clone());
        registry.try_acquire("k", "a", TTL).await.unwrap();
        clock.advance(TTL);
        assert_eq!(registry.renew_and_check("k", TTL).await.unwrap(), None);
        assert_eq!(registry.live_leases(), 0);
    }

    #[tokio::test]
    async fn outage_fails_every_operation() {
        let registry = MemoryRegistry::new(ManualClock::new(0));
        registry.set_available(false);
        assert!(matches!(
            registry.try_acquire("k", "a", TTL).await,
            Err(RegistryError::Unavailable { .. })
        ));
        assert!(registry.renew_and_check("k", TTL).await.is_err());

        registry.set_available(true);
        assert!(registry.try_acquire("k", "a", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn evict_frees_the_slot() {
        let registry = MemoryRegistry::new(ManualClock::new(0));
        registry.try_acquire("k", "a", TTL).await.unwrap();
        assert!(registry.evict("k"));
        assert!(registry.try_acquire("k", "b", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_replies() {
        let registry = MemoryRegistry::new(ManualClock::new(0));
        registry.set_latency(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        registry.try_acquire("k", "a", TTL).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
