//! Table preprocessing ahead of modeling: differencing, timestamp alignment
//! and calendar aggregation.

pub mod aggregate;
pub mod align;
pub mod difference;

pub use aggregate::*;
pub use align::*;
pub use difference::*;
