use core::{cmp, marker::PhantomData};

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, IdEncoder, Poll, Result, SnowflakeId, TimeSource,
    encoder::interface::{WORKER_UNSET, decode_worker},
    mutex::Mutex,
};

/// A mutex-based encoder.
///
/// Callers are serialized on the `(last_millis, sequence)` pair, which gives
/// fair access under contention at the cost of throughput. With the
/// `parking-lot` feature the lock cannot be poisoned.
///
/// ## See Also
/// - [`AtomicEncoder`]
///
/// [`AtomicEncoder`]: crate::AtomicEncoder
pub struct LockEncoder<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    state: Mutex<ID>,
    worker: AtomicU64,
    time: T,
    _id: PhantomData<fn() -> ID>,
}

impl<ID, T> LockEncoder<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    /// Creates an encoder with no worker id assigned.
    pub fn new(time: T) -> Self {
        Self::from_components(0, 0, time)
    }

    pub fn from_components(last_millis: u64, sequence: u64, time: T) -> Self {
        Self {
            state: Mutex::new(ID::from_components(last_millis, 0, sequence)),
            worker: AtomicU64::new(WORKER_UNSET),
            time,
            _id: PhantomData,
        }
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<Poll<ID>> {
        let worker_id = decode_worker(self.worker.load(Ordering::Acquire))
            .ok_or(Error::WorkerIdUnset)?;

        let mut state = {
            #[cfg(feature = "parking-lot")]
            {
                self.state.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.state.lock()?
            }
        };

        // Read under the lock so the clock is never older than the state.
        let now = self.time.current_millis();
        if now > ID::max_timestamp() {
            return Err(Error::TimestampOverflow { now_millis: now });
        }

        let current_ts = state.timestamp();
        match now.cmp(&current_ts) {
            cmp::Ordering::Equal => {
                if state.has_sequence_room() {
                    *state = state.increment_sequence();
                } else {
                    return Ok(Poll::Pending { yield_for: 1 });
                }
            }
            cmp::Ordering::Greater => *state = state.rollover_to_timestamp(now),
            cmp::Ordering::Less => {
                return Err(Error::ClockRollback {
                    last_millis: current_ts,
                    now_millis: now,
                });
            }
        }

        Ok(Poll::Ready {
            id: state.with_machine_id(worker_id),
        })
    }
}

impl<ID, T> IdEncoder for LockEncoder<ID, T>
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
