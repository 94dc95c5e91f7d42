//! Error types.
//!
//! Two layers:
//!
//! - [`TsError`]: typed failures raised by the adapter, validation layer and
//!   engines. Every variant maps to one [`ErrorKind`].
//! - [`ErrorReport`]: the uniform report the orchestrator hands back to the
//!   caller (`operation`, `kind`, `message`).
//!
//! The binary converts reports into [`AppError`], which carries a process exit
//! code.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, TsError>;

/// Errors raised while converting, validating or modeling a series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TsError {
    #[error("column '{column}' not found in input table")]
    MissingColumn { column: String },

    #[error("column '{column}' has type {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("index is not strictly increasing: {0}")]
    UnsortedIndex(String),

    #[error("series indices do not match: {0}")]
    IndexMismatch(String),

    #[error("need at least {required} non-missing points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("missing values present: {0}")]
    MissingData(String),

    #[error("irregular frequency: {0}")]
    IrregularFrequency(String),

    #[error("series is not stationary (ADF p-value {p_value:.4} > {threshold})")]
    NonStationary { p_value: f64, threshold: f64 },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("optimizer did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: u64, reason: String },

    #[error("missing exogenous data: {0}")]
    MissingExogenousData(String),
}

impl TsError {
    /// Shorthand for [`TsError::InvalidParameter`].
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        TsError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TsError::MissingColumn { .. } => ErrorKind::MissingColumn,
            TsError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            TsError::UnsortedIndex(_) => ErrorKind::UnsortedIndex,
            TsError::IndexMismatch(_) => ErrorKind::IndexMismatch,
            TsError::InsufficientData { .. } => ErrorKind::InsufficientData,
            TsError::MissingData(_) => ErrorKind::MissingData,
            TsError::IrregularFrequency(_) => ErrorKind::IrregularFrequency,
            TsError::NonStationary { .. } => ErrorKind::NonStationary,
            TsError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            TsError::InvalidData(_) => ErrorKind::InvalidData,
            TsError::Convergence { .. } => ErrorKind::Convergence,
            TsError::MissingExogenousData(_) => ErrorKind::MissingExogenousData,
        }
    }
}

/// Error taxonomy shared by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingColumn,
    TypeMismatch,
    UnsortedIndex,
    IndexMismatch,
    InsufficientData,
    MissingData,
    IrregularFrequency,
    NonStationary,
    InvalidParameter,
    InvalidData,
    Convergence,
    MissingExogenousData,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::MissingColumn => "MissingColumnError",
            ErrorKind::TypeMismatch => "TypeMismatchError",
            ErrorKind::UnsortedIndex => "UnsortedIndexError",
            ErrorKind::IndexMismatch => "IndexMismatchError",
            ErrorKind::InsufficientData => "InsufficientDataError",
            ErrorKind::MissingData => "MissingDataError",
            ErrorKind::IrregularFrequency => "IrregularFrequencyError",
            ErrorKind::NonStationary => "NonStationaryError",
            ErrorKind::InvalidParameter => "InvalidParameterError",
            ErrorKind::InvalidData => "InvalidDataError",
            ErrorKind::Convergence => "ConvergenceError",
            ErrorKind::MissingExogenousData => "MissingExogenousDataError",
        }
    }

    /// Validation failures can be fixed by the caller (transform the data,
    /// relax a requirement) and retried. Everything else is terminal for the
    /// invocation.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::InsufficientData
                | ErrorKind::MissingData
                | ErrorKind::IrregularFrequency
                | ErrorKind::NonStationary
        )
    }

    /// Process exit code used by the `tsa` binary.
    ///
    /// - 2: bad input table or parameters
    /// - 3: data does not satisfy the operation's preconditions
    /// - 4: computation failed
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::MissingColumn
            | ErrorKind::TypeMismatch
            | ErrorKind::UnsortedIndex
            | ErrorKind::IndexMismatch
            | ErrorKind::InvalidParameter
            | ErrorKind::MissingExogenousData => 2,
            ErrorKind::InsufficientData
            | ErrorKind::MissingData
            | ErrorKind::IrregularFrequency
            | ErrorKind::NonStationary
            | ErrorKind::InvalidData => 3,
            ErrorKind::Convergence => 4,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Uniform failure report produced by the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{operation} failed with {kind}: {message}")]
pub struct ErrorReport {
    pub operation: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(operation: impl Into<String>, err: &TsError) -> Self {
        Self {
            operation: operation.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Error surfaced by the `tsa` binary: a message plus an exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ErrorReport> for AppError {
    fn from(report: ErrorReport) -> Self {
        AppError::new(report.kind.exit_code(), report.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = TsError::InsufficientData { required: 20, actual: 10 };
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert_eq!(err.kind().to_string(), "InsufficientDataError");
        assert!(err.kind().is_recoverable());

        let err = TsError::Convergence { iterations: 500, reason: "max iterations".into() };
        assert_eq!(err.kind(), ErrorKind::Convergence);
        assert!(!err.kind().is_recoverable());
    }

    #[test]
    fn report_carries_operation_and_message() {
        let err = TsError::MissingColumn { column: "sales".into() };
        let report = ErrorReport::new("decompose", &err);
        assert_eq!(report.operation, "decompose");
        assert_eq!(report.kind, ErrorKind::MissingColumn);
        assert!(report.message.contains("sales"));
        assert!(report.to_string().contains("MissingColumnError"));
    }

    #[test]
    fn app_error_exit_codes_follow_kind() {
        let report = ErrorReport::new("forecast", &TsError::invalid_parameter("horizon", "must be >= 1"));
        assert_eq!(AppError::from(report).exit_code(), 2);

        let report = ErrorReport::new("forecast", &TsError::MissingData("row 3".into()));
        assert_eq!(AppError::from(report).exit_code(), 3);

        let report = ErrorReport::new(
            "forecast",
            &TsError::Convergence { iterations: 10, reason: "max iterations".into() },
        );
        assert_eq!(AppError::from(report).exit_code(), 4);
    }
}
