mod config;
mod generator;
mod interface;
mod status;
#[cfg(test)]
mod tests;

pub use config::*;
pub use generator::*;
pub use interface::*;
pub use status::*;
