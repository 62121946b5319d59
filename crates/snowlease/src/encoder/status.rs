use crate::SnowflakeId;

/// The outcome of one non-blocking attempt to encode an ID.
///
/// - [`Poll::Ready`] carries a freshly encoded ID.
/// - [`Poll::Pending`] means the sequence for the current millisecond is
///   exhausted (or a concurrent caller won the race) and the caller should
///   retry after `yield_for` milliseconds. A `yield_for` of zero means retry
///   immediately.
///
/// # Example
///
/// ```
/// use snowlease::{AtomicEncoder, IdEncoder, LeaseSnowflakeId, ManualClock, Poll};
///
/// let encoder = AtomicEncoder::<LeaseSnowflakeId, _>::new(ManualClock::new(1));
/// encoder.assign_worker_id(3);
/// match encoder.try_poll_id().unwrap() {
///     Poll::Ready { id } => assert_eq!(id.machine_id(), 3),
///     Poll::Pending { yield_for } => println!("back off for {yield_for}ms"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll<ID: SnowflakeId> {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated ID.
        id: ID,
    },
    /// No ID could be generated yet.
    Pending {
        /// Milliseconds to wait before trying again.
        yield_for: u64,
    },
}
