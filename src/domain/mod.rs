//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the tabular shape exchanged with callers (`TableView`)
//! - gap-aware series and their index (`TimeSeries`, `SeriesIndex`)
//! - sampling steps (`Step`)
//! - model specs, operation configs and engine outputs (`types`)

pub mod frequency;
pub mod series;
pub mod table;
pub mod types;

pub use frequency::*;
pub use series::*;
pub use table::*;
pub use types::*;
