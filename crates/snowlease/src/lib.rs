#![doc = include_str!("../README.md")]

mod encoder;
mod error;
mod generator;
#[cfg(feature = "global")]
pub mod global;
mod id;
mod identity;
mod keepalive;
mod mutex;
mod registry;
mod time;
mod worker;

pub use crate::encoder::*;
pub use crate::error::*;
pub use crate::generator::*;
#[cfg(feature = "global")]
pub use crate::global::{install_global, next_id};
pub use crate::id::*;
pub use crate::identity::*;
pub use crate::keepalive::KeepaliveHandle;
pub use crate::registry::*;
pub use crate::time::*;
pub use crate::worker::*;
