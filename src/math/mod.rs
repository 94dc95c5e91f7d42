//! Mathematical utilities: least squares, lag polynomials, optimization and
//! basic statistics.

pub mod ols;
pub mod optim;
pub mod poly;
pub mod stats;

pub use ols::*;
pub use optim::*;
pub use poly::*;
pub use stats::*;
