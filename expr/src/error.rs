//! Expression error types.

use sieve_core::CoreError;
use thiserror::Error;

/// Errors that can occur while building, evaluating, or composing expressions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    /// A parameter was evaluated without a value bound to it.
    #[error("Unbound parameter '{name}'")]
    UnboundParameter { name: String },

    /// Operand or argument types do not fit the operation.
    #[error("type error: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Member access on a record type that has no such field.
    #[error("Unknown member '{member}' on type '{type_name}'")]
    UnknownMember { member: String, type_name: String },

    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Checked arithmetic did not fit the operand type.
    #[error("Arithmetic overflow in {op}")]
    Overflow { op: String },

    /// Division by zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// Value construction or conversion failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ExprError {
    pub fn unbound_parameter(name: impl Into<String>) -> Self {
        Self::UnboundParameter { name: name.into() }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn unknown_member(member: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnknownMember {
            member: member.into(),
            type_name: type_name.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn overflow(op: impl Into<String>) -> Self {
        Self::Overflow { op: op.into() }
    }
}

/// Result type for expression operations.
pub type ExprResult<T> = Result<T, ExprError>;
