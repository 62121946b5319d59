use crate::{Poll, Result, SnowflakeId};

/// Sentinel stored in an encoder's worker slot before a lease is held.
pub(crate) const WORKER_UNSET: u64 = u64::MAX;

/// Packs (timestamp, worker id, sequence) into IDs and keeps the
/// `(last_millis, sequence)` pair consistent across concurrent callers.
///
/// The worker id is assigned by whoever holds the lease and may change when
/// a lease is lost and re-acquired; the timestamp/sequence state survives
/// such changes so a process never reissues a `(timestamp, sequence)` pair.
pub trait IdEncoder: Send + Sync {
    /// The ID layout produced by this encoder.
    type Id: SnowflakeId;

    /// Milliseconds since the epoch, read from the encoder's clock.
    fn current_millis(&self) -> u64;

    /// Installs the worker id stamped into every subsequent ID.
    fn assign_worker_id(&self, worker_id: u64);

    /// Makes the encoder unusable until a worker id is assigned again.
    fn clear_worker_id(&self);

    /// The currently assigned worker id, if any.
    fn worker_id(&self) -> Option<u64>;

    /// Attempts to encode the next ID without blocking.
    ///
    /// # Errors
    ///
    /// - [`Error::WorkerIdUnset`] before a worker id was assigned.
    /// - [`Error::ClockRollback`] when the clock reads earlier than the last
    ///   millisecond used.
    /// - [`Error::TimestampOverflow`] when the clock no longer fits the
    ///   layout's timestamp field.
    /// - [`Error::LockPoisoned`] for lock-based encoders.
    ///
    /// [`Error::WorkerIdUnset`]: crate::Error::WorkerIdUnset
    /// [`Error::ClockRollback`]: crate::Error::ClockRollback
    /// [`Error::TimestampOverflow`]: crate::Error::TimestampOverflow
    /// [`Error::LockPoisoned`]: crate::Error::LockPoisoned
    fn try_poll_id(&self) -> Result<Poll<Self::Id>>;
}

pub(crate) const fn decode_worker(raw: u64) -> Option<u64> {
    if raw == WORKER_UNSET { None } else { Some(raw) }
}
