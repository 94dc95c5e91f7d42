//! `ts-pipeline` library crate.
//!
//! Time-series pipeline operations behind the `tsa` binary: a table/series
//! adapter, validation, ACF/PACF and ADF diagnostics, classical decomposition,
//! SARIMAX forecasting, preprocessing (difference, align, aggregate) and a
//! residual analyzer. The binary is a thin wrapper so every operation is
//! testable without spawning processes.

pub mod adapter;
pub mod app;
pub mod cli;
pub mod data;
pub mod decompose;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod io;
pub mod math;
pub mod plot;
pub mod preprocess;
pub mod report;
pub mod validate;
