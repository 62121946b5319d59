use core::{fmt, hash::Hash, time::Duration};

/// A 64-bit Snowflake-style ID with separate bit fields for timestamp, worker
/// (machine) id, and per-millisecond sequence.
///
/// Types implementing this trait are usually produced by
/// [`define_snowflake_id!`], which checks at compile time that the fields
/// exactly fill 64 bits.
///
/// # Example
///
/// ```
/// use snowlease::{LeaseSnowflakeId, SnowflakeId};
///
/// let id = LeaseSnowflakeId::from_components(1000, 2, 1);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.machine_id(), 2);
/// assert_eq!(id.sequence(), 1);
/// assert_eq!(LeaseSnowflakeId::max_workers(), 1024);
/// ```
///
/// [`define_snowflake_id!`]: crate::define_snowflake_id
pub trait SnowflakeId:
    Sized
    + Copy
    + Clone
    + fmt::Display
    + fmt::Debug
    + PartialOrd
    + Ord
    + PartialEq
    + Eq
    + Hash
    + Send
    + Sync
{
    const RESERVED_BITS: u32;
    const TIMESTAMP_BITS: u32;
    const MACHINE_ID_BITS: u32;
    const SEQUENCE_BITS: u32;

    /// Returns the timestamp portion of the ID.
    fn timestamp(&self) -> u64;

    /// Returns the maximum possible value for the timestamp field.
    fn max_timestamp() -> u64 {
        (1 << Self::TIMESTAMP_BITS) - 1
    }

    /// Returns the worker id portion of the ID.
    fn machine_id(&self) -> u64;

    /// Returns the maximum possible value for the worker id field.
    fn max_machine_id() -> u64 {
        (1 << Self::MACHINE_ID_BITS) - 1
    }

    /// Number of distinct worker ids the layout can carry (`2^W`).
    fn max_workers() -> u64 {
        Self::max_machine_id() + 1
    }

    /// Returns the sequence portion of the ID.
    fn sequence(&self) -> u64;

    /// Returns the maximum possible value for the sequence field.
    fn max_sequence() -> u64 {
        (1 << Self::SEQUENCE_BITS) - 1
    }

    /// Constructs a new ID from its components.
    fn from_components(timestamp: u64, machine_id: u64, sequence: u64) -> Self;

    /// Converts this type into its raw representation.
    fn to_raw(&self) -> u64;

    /// Converts a raw value into this type.
    fn from_raw(raw: u64) -> Self;

    /// Returns true if the current sequence value can be incremented.
    fn has_sequence_room(&self) -> bool {
        self.sequence() < Self::max_sequence()
    }

    /// Returns a new ID with the sequence incremented.
    fn increment_sequence(&self) -> Self {
        Self::from_components(self.timestamp(), self.machine_id(), self.sequence() + 1)
    }

    /// Returns a new ID for a newer timestamp with the sequence reset to zero.
    fn rollover_to_timestamp(&self, ts: u64) -> Self {
        Self::from_components(ts, self.machine_id(), 0)
    }

    /// Returns the same timestamp and sequence stamped with another worker id.
    fn with_machine_id(&self, machine_id: u64) -> Self {
        Self::from_components(self.timestamp(), machine_id, self.sequence())
    }

    /// Unpacks the ID into its fields.
    fn components(&self) -> Components {
        Components {
            timestamp: self.timestamp(),
            machine_id: self.machine_id(),
            sequence: self.sequence(),
        }
    }

    /// Converts the timestamp field back to milliseconds since the Unix
    /// epoch, given the epoch the generating clock was anchored to.
    fn unix_millis(&self, epoch: Duration) -> u64 {
        epoch.as_millis() as u64 + self.timestamp()
    }
}

/// The decoded fields of a [`SnowflakeId`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Components {
    pub timestamp: u64,
    pub machine_id: u64,
    pub sequence: u64,
}
