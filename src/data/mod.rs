//! Data sources that do not come from an input table.

pub mod sample;

pub use sample::*;
