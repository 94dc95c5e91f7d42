//! Input/output helpers.
//!
//! - CSV ingest with column type inference (`ingest`)
//! - CSV export of result tables (`export`)
//! - saved model JSON read/write (`model`)

pub mod export;
pub mod ingest;
pub mod model;

pub use export::*;
pub use ingest::*;
pub use model::*;
