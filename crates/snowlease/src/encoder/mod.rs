mod atomic;
mod interface;
mod lock;
mod status;

pub use atomic::*;
pub use interface::*;
pub use lock::*;
pub use status::*;
