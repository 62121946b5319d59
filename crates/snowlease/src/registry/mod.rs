//! Lease registry clients.
//!
//! The core only needs two atomic operations from the external store:
//! create-if-absent with a TTL, and read-with-TTL-refresh. See
//! [`LeaseRegistry`].

mod interface;
mod key;
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use interface::*;
pub use key::*;
pub use memory::*;
#[cfg(feature = "redis")]
pub use self::redis::*;
