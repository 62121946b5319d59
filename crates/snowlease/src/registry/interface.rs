use core::{future::Future, time::Duration};
use std::sync::Arc;

use crate::RegistryError;

/// Protocol adapter over an external key/value store with expiring keys.
///
/// Both operations must be atomic on the store side and safe to repeat:
/// retrying `try_acquire` after a lost reply at worst reports `false` for a
/// lease this process created, which then simply expires.
pub trait LeaseRegistry: Send + Sync {
    /// Creates `key = identity` with the given TTL only if `key` is absent (or
    /// expired).
    ///
    /// Returns `true` iff this call created the entry.
    fn try_acquire(
        &self,
        key: &str,
        identity: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, RegistryError>> + Send;

    /// Resets the TTL of `key` and returns its current value, or `None` when
    /// the key no longer exists.
    ///
    /// The caller compares the value with its own identity to detect that
    /// the slot was taken over after an unnoticed expiry.
    fn renew_and_check(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<Option<String>, RegistryError>> + Send;
}

impl<R: LeaseRegistry + ?Sized> LeaseRegistry for Arc<R> {
    fn try_acquire(
        &self,
        key: &str,
        identity: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, RegistryError>> + Send {
        (**self).try_acquire(key, identity, ttl)
    }

    fn renew_and_check(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<Option<String>, RegistryError>> + Send {
        (**self).renew_and_check(key, ttl)
    }
}
