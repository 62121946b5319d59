use core::{cmp, marker::PhantomData};

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, IdEncoder, Poll, Result, SnowflakeId, TimeSource,
    encoder::interface::{WORKER_UNSET, decode_worker},
};

/// A lock-free encoder suitable for many concurrent callers.
///
/// The `(last_millis, sequence)` pair is stored packed in a single
/// [`AtomicU64`] (with the worker field zeroed) and advanced with
/// compare-and-swap, so a torn read of the pair is impossible. Losing a CAS
/// race yields [`Poll::Pending`] with `yield_for == 0`.
///
/// ## See Also
/// - [`LockEncoder`]
///
/// [`LockEncoder`]: crate::LockEncoder
pub struct AtomicEncoder<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    state: AtomicU64,
    worker: AtomicU64,
    time: T,
    _id: PhantomData<fn() -> ID>,
}

impl<ID, T> AtomicEncoder<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    /// Creates an encoder with no worker id assigned.
    pub fn new(time: T) -> Self {
        Self::from_components(0, 0, time)
    }

    /// Creates an encoder whose last used millisecond and sequence are
    /// preloaded, e.g. to resume past a high-water mark persisted elsewhere.
    pub fn from_components(last_millis: u64, sequence: u64, time: T) -> Self {
        let initial = ID::from_components(last_millis, 0, sequence).to_raw();
        Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(AtomicU64::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            state: AtomicU64::new(initial),
            worker: AtomicU64::new(WORKER_UNSET),
            time,
            _id: PhantomData,
        }
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<Poll<ID>> {
        let worker_id = decode_worker(self.worker.load(Ordering::Acquire))
            .ok_or(Error::WorkerIdUnset)?;

        // State first, clock second: the loaded timestamp was read from the
        // clock before this call's read, so `Less` means a real rollback.
        let current_raw = self.state.load(Ordering::Acquire);
        let current = ID::from_raw(current_raw);
        let current_ts = current.timestamp();

        let now = self.time.current_millis();
        if now > ID::max_timestamp() {
            return Err(Error::TimestampOverflow { now_millis: now });
        }

        let next = match now.cmp(&current_ts) {
            cmp::Ordering::Equal => {
                if current.has_sequence_room() {
                    current.increment_sequence()
                } else {
                    return Ok(Poll::Pending { yield_for: 1 });
                }
            }
            cmp::Ordering::Greater => current.rollover_to_timestamp(now),
            cmp::Ordering::Less => return Err(Self::cold_clock_behind(now, current_ts)),
        };

        if self
            .state
            .compare_exchange(
                current_raw,
                next.to_raw(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            Ok(Poll::Ready {
                id: next.with_machine_id(worker_id),
            })
        } else {
            // Another caller won the race; retry immediately.
            Ok(Poll::Pending { yield_for: 0 })
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last: u64) -> Error {
        Error::ClockRollback {
            last_millis: last,
            now_millis: now,
        }
    }
}

impl<ID, T> IdEncoder for AtomicEncoder<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource + Send + Sync,
{
    type Id = ID;

    fn current_millis(&self) -> u64 {
        self.time.current_millis()
    }

    fn assign_worker_id(&self, worker_id: u64) {
        debug_assert!(worker_id <= ID::max_machine_id(), "machine_id overflow");
        self.worker.store(worker_id, Ordering::Release);
    }

    fn clear_worker_id(&self) {
        self.worker.store(WORKER_UNSET, Ordering::Release);
    }

    fn worker_id(&self) -> Option<u64> {
        decode_worker(self.worker.load(Ordering::Acquire))
    }

    fn try_poll_id(&self) -> Result<Poll<ID>> {
        self.try_poll_id()
    }
}
