mod interface;
mod layout;
mod snowflake;

pub use interface::*;
pub use layout::*;
pub use snowflake::*;
