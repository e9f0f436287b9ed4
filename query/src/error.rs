//! Query error types.

use sieve_core::CoreError;
use sieve_expr::ExprError;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while composing or executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// An operation was applied in an order the algebra does not allow.
    #[error("{message}")]
    InvalidComposition { message: String },

    /// The operation cannot be expressed at all.
    #[error("{operation} is not supported: {message}")]
    NotSupported { operation: String, message: String },

    #[error("Sequence contains no elements")]
    EmptyResult,

    #[error("Sequence contains more than one element")]
    MultipleResults,

    /// Two lambdas could not be composed.
    #[error("Cannot merge expressions: {source}")]
    MergeFailure {
        #[source]
        source: ExprError,
    },

    #[error("Cannot convert {from} to {to}")]
    CoercionFailure { from: String, to: String },

    #[error("Invalid argument '{name}': {message}")]
    ArgumentError { name: String, message: String },

    /// Failure reported by the execution backend.
    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Operation was cancelled")]
    Cancelled,
}

impl QueryError {
    pub fn invalid_composition(message: impl Into<String>) -> Self {
        Self::InvalidComposition {
            message: message.into(),
        }
    }

    pub fn not_supported(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn merge_failure(source: ExprError) -> Self {
        Self::MergeFailure { source }
    }

    pub fn coercion_failure(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::CoercionFailure {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn argument_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArgumentError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<CoreError> for QueryError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Coercion { from, to } => Self::CoercionFailure { from, to },
            other => Self::Backend {
                message: other.to_string(),
            },
        }
    }
}

impl From<ExprError> for QueryError {
    fn from(e: ExprError) -> Self {
        match e {
            ExprError::Core(core) => core.into(),
            other => Self::Backend {
                message: other.to_string(),
            },
        }
    }
}
