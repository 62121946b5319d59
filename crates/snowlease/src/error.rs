use core::time::Duration;

/// A result type defaulting to the crate [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `snowlease` can emit.
///
/// Registry failures and lease loss are absorbed by the keepalive loop and
/// only surface through [`Generator::last_error`]. Encoder failures are
/// returned synchronously from [`Generator::next_id`].
///
/// [`Generator::last_error`]: crate::Generator::last_error
/// [`Generator::next_id`]: crate::Generator::next_id
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Every candidate slot is held by another identity.
    #[error("no available worker id: all {max_workers} slots are leased")]
    NoAvailableWorkerId { max_workers: u64 },

    /// The lease registry could not be reached or timed out.
    #[error("lease registry unavailable: {0}")]
    RegistryUnavailable(#[from] RegistryError),

    /// Renewal found the slot empty or held by a foreign identity.
    #[error("lease lost for {key} (holder: {holder:?})")]
    LeaseLost { key: String, holder: Option<String> },

    /// The local lease deadline passed without a successful renewal.
    #[error("lease for worker id {worker_id} expired locally before renewal")]
    LeaseExpired { worker_id: u64 },

    /// The clock moved backward past the last millisecond used by this
    /// worker.
    #[error("clock moved backward: last used {last_millis}ms, now {now_millis}ms")]
    ClockRollback { last_millis: u64, now_millis: u64 },

    /// The clock reading no longer fits the layout's timestamp field.
    #[error("timestamp {now_millis}ms exceeds the layout's timestamp field")]
    TimestampOverflow { now_millis: u64 },

    /// The generator does not currently hold a lease.
    #[error("id generator is not running")]
    NotRunning,

    /// The encoder was used before a worker id was assigned.
    #[error("worker id has not been assigned")]
    WorkerIdUnset,

    /// Construction-time misconfiguration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A thread panicked while holding the encoder lock.
    #[error("lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Returns `true` for conditions the keepalive loop retries on its next
    /// tick.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoAvailableWorkerId { .. }
                | Self::RegistryUnavailable(_)
                | Self::LeaseLost { .. }
                | Self::LeaseExpired { .. }
                | Self::NotRunning
        )
    }
}

/// Failures of the external lease registry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The store rejected the request or the connection failed.
    #[error("{reason}")]
    Unavailable { reason: String },

    /// The store did not answer within the configured bound.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },
}

impl RegistryError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

#[cfg(not(feature = "parking-lot"))]
use std::sync::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_convert_into_unavailable() {
        let err: Error = RegistryError::unavailable("connection refused").into();
        assert_eq!(
            err,
            Error::RegistryUnavailable(RegistryError::Unavailable {
                reason: "connection refused".into()
            })
        );
        assert_eq!(
            err.to_string(),
            "lease registry unavailable: connection refused"
        );
    }

    #[test]
    fn only_lease_conditions_are_retryable() {
        assert!(Error::NoAvailableWorkerId { max_workers: 4 }.is_retryable());
        assert!(Error::NotRunning.is_retryable());
        assert!(
            Error::LeaseLost {
                key: "/snowflake/worker/0".into(),
                holder: None
            }
            .is_retryable()
        );
        assert!(
            !Error::ClockRollback {
                last_millis: 10,
                now_millis: 5
            }
            .is_retryable()
        );
        assert!(!Error::WorkerIdUnset.is_retryable());
    }
}
