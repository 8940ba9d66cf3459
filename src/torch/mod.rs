//! Torch components
pub mod distributions;
pub mod initializers;
pub mod modules;
pub mod utils;

pub use initializers::Initializer;
pub use modules::{BuildModule, FeedForwardModule, Module};
