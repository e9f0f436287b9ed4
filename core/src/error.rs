//! Common error types for Sieve values.

use thiserror::Error;

/// Errors that can occur when building or converting values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A value could not be represented as the requested type.
    #[error("Cannot convert {from} to {to}")]
    Coercion { from: String, to: String },

    /// A record was built with the wrong number of field values.
    #[error("Record '{record}' expects {expected} fields, got {actual}")]
    RecordArity {
        record: String,
        expected: usize,
        actual: usize,
    },

    /// A record has no field with the requested name.
    #[error("Unknown field '{field}' on record '{record}'")]
    UnknownField { record: String, field: String },
}

impl CoreError {
    pub fn coercion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Coercion {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn record_arity(record: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::RecordArity {
            record: record.into(),
            expected,
            actual,
        }
    }

    pub fn unknown_field(record: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            record: record.into(),
            field: field.into(),
        }
    }
}

/// Result type for value operations.
pub type CoreResult<T> = Result<T, CoreError>;
