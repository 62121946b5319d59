/// Defines a 64-bit Snowflake ID layout.
///
/// Fields are packed from the most significant bit down: reserved, timestamp,
/// machine (worker) id, sequence. The widths must sum to 64, which is checked
/// at compile time.
///
/// ```text
///  Bit Index:  63                                                         0
///              +--------------+---------------+----------------+-----------+
///  Field:      | reserved (R) | timestamp (T) | machine id (M) | seq (S)   |
///              +--------------+---------------+----------------+-----------+
/// ```
///
/// ## Example
///
/// ```
/// use snowlease::{SnowflakeId, define_snowflake_id};
///
/// define_snowflake_id!(
///     /// 256 workers, 16384 ids per millisecond.
///     SmallClusterId,
///     reserved: 1,
///     timestamp: 41,
///     machine_id: 8,
///     sequence: 14
/// );
///
/// assert_eq!(SmallClusterId::max_workers(), 256);
/// assert_eq!(SmallClusterId::max_sequence(), 16383);
/// ```
#[macro_export]
macro_rules! define_snowflake_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        reserved: $reserved_bits:expr,
        timestamp: $timestamp_bits:expr,
        machine_id: $machine_bits:expr,
        sequence: $sequence_bits:expr
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            id: u64,
        }

        const _: () = {
            assert!(
                $reserved_bits + $timestamp_bits + $machine_bits + $sequence_bits == 64,
                "Snowflake layout must fill exactly 64 bits"
            );
        };

        impl $name {
            pub const SEQUENCE_SHIFT: u32 = 0;
            pub const MACHINE_ID_SHIFT: u32 = Self::SEQUENCE_SHIFT + $sequence_bits;
            pub const TIMESTAMP_SHIFT: u32 = Self::MACHINE_ID_SHIFT + $machine_bits;

            pub const TIMESTAMP_MASK: u64 = (1 << $timestamp_bits) - 1;
            pub const MACHINE_ID_MASK: u64 = (1 << $machine_bits) - 1;
            pub const SEQUENCE_MASK: u64 = (1 << $sequence_bits) - 1;

            pub const fn from(timestamp: u64, machine_id: u64, sequence: u64) -> Self {
                let timestamp = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
                let machine_id = (machine_id & Self::MACHINE_ID_MASK) << Self::MACHINE_ID_SHIFT;
                let sequence = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
                Self {
                    id: timestamp | machine_id | sequence,
                }
            }

            /// Extracts the timestamp from the packed ID.
            pub const fn timestamp(&self) -> u64 {
                (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
            }

            /// Extracts the worker id from the packed ID.
            pub const fn machine_id(&self) -> u64 {
                (self.id >> Self::MACHINE_ID_SHIFT) & Self::MACHINE_ID_MASK
            }

            /// Extracts the sequence number from the packed ID.
            pub const fn sequence(&self) -> u64 {
                (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
            }

            /// Returns the ID as a signed integer. With a reserved top bit
            /// the value is never negative.
            pub const fn as_i64(&self) -> i64 {
                self.id as i64
            }

            /// Returns the ID as a zero-padded 20-digit string.
            pub fn to_padded_string(&self) -> String {
                format!("{:020}", self.id)
            }
        }

        impl $crate::SnowflakeId for $name {
            const RESERVED_BITS: u32 = $reserved_bits;
            const TIMESTAMP_BITS: u32 = $timestamp_bits;
            const MACHINE_ID_BITS: u32 = $machine_bits;
            const SEQUENCE_BITS: u32 = $sequence_bits;

            fn timestamp(&self) -> u64 {
                self.timestamp()
            }

            fn machine_id(&self) -> u64 {
                self.machine_id()
            }

            fn sequence(&self) -> u64 {
                self.sequence()
            }

            fn from_components(timestamp: u64, machine_id: u64, sequence: u64) -> Self {
                debug_assert!(timestamp <= Self::TIMESTAMP_MASK, "timestamp overflow");
                debug_assert!(machine_id <= Self::MACHINE_ID_MASK, "machine_id overflow");
                debug_assert!(sequence <= Self::SEQUENCE_MASK, "sequence overflow");
                Self::from(timestamp, machine_id, sequence)
            }

            fn to_raw(&self) -> u64 {
                self.id
            }

            fn from_raw(raw: u64) -> Self {
                Self { id: raw }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.id)
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                $crate::write_bit_layout_debug(f, self, stringify!($name))
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.id
            }
        }
    };
}

define_snowflake_id!(
    /// The default 64-bit layout handed out by leased generators.
    ///
    /// - 1 bit reserved (keeps the value positive as an `i64`)
    /// - 41 bits timestamp (ms since the generator's epoch, ~69 years)
    /// - 10 bits worker id (1024 leasable slots)
    /// - 12 bits sequence (4096 ids per millisecond per worker)
    ///
    /// ```text
    ///  Bit Index:  63           63 62            22 21             12 11             0
    ///              +--------------+----------------+-----------------+---------------+
    ///  Field:      | reserved (1) | timestamp (41) | worker id (10)  | sequence (12) |
    ///              +--------------+----------------+-----------------+---------------+
    /// ```
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    LeaseSnowflakeId,
    reserved: 1,
    timestamp: 41,
    machine_id: 10,
    sequence: 12
);

define_snowflake_id!(
    /// A layout for large fleets: 8192 worker slots, 512 ids per millisecond
    /// per worker.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    SnowflakeWideWorkerId,
    reserved: 1,
    timestamp: 41,
    machine_id: 13,
    sequence: 9
);
