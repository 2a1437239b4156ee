//! Unified error type for topology reconstruction
//!
//! Record-level failures are represented by [`TopologyError`] and are normally
//! turned into a diagnostic plus a skipped record by the caller; file-level
//! failures in the readers and the binary travel as `anyhow::Error` and are
//! converted here when they cross into the core API.
//!
//! # Example
//!
//! ```ignore
//! use gridtrace_core::{PhaseSet, TopologyResult};
//!
//! fn decode(code: i64) -> TopologyResult<PhaseSet> {
//!     let phases = PhaseSet::from_code(code)?;
//!     Ok(phases)
//! }
//! ```

use thiserror::Error;

/// Error type for all topology operations.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// Phase code outside the 1..=8 range of the source schema
    #[error("unknown phase code {0}")]
    UnknownPhaseCode(i64),

    /// A required column is absent from a table
    #[error("table {table} has no column {column}")]
    MissingField { table: String, column: String },

    /// A referenced row could not be found
    #[error("no {table} record for {key}")]
    MissingRecord { table: String, key: String },

    #[error("unknown element {0}")]
    UnknownElement(String),

    #[error("unknown bus {0}")]
    UnknownBus(String),

    /// A value is present but cannot be interpreted
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for Results using TopologyError.
pub type TopologyResult<T> = Result<T, TopologyError>;

impl TopologyError {
    pub fn missing_field(table: impl Into<String>, column: impl Into<String>) -> Self {
        TopologyError::MissingField {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn missing_record(table: impl Into<String>, key: impl Into<String>) -> Self {
        TopologyError::MissingRecord {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TopologyError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Diagnostic category used when this error is downgraded to a skipped record
    pub fn category(&self) -> &'static str {
        match self {
            TopologyError::UnknownPhaseCode(_) => "phase",
            TopologyError::MissingField { .. } | TopologyError::MissingRecord { .. } => "schema",
            TopologyError::UnknownElement(_) | TopologyError::UnknownBus(_) => "reference",
            TopologyError::InvalidValue { .. } | TopologyError::Parse(_) => "parse",
            TopologyError::Config(_) => "config",
            TopologyError::Io(_) => "io",
        }
    }
}

impl From<anyhow::Error> for TopologyError {
    fn from(err: anyhow::Error) -> Self {
        TopologyError::Parse(format!("{err:#}"))
    }
}
