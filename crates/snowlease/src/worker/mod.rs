mod manager;
mod slot_order;

pub use manager::*;
pub use slot_order::*;
