//! Error types for the test harness.

use sieve_query::QueryError;
use thiserror::Error;

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur when running scenarios.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No source query was configured.
    #[error("source not specified for scenario '{scenario}'")]
    MissingSource { scenario: String },

    /// Assertion failed.
    #[error("assertion failed for step '{step}': {message}")]
    AssertionFailed { step: String, message: String },

    /// Building the fixture data failed.
    #[error("fixture '{fixture}' is invalid: {message}")]
    Fixture { fixture: String, message: String },

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

impl HarnessError {
    pub fn missing_source(scenario: impl Into<String>) -> Self {
        Self::MissingSource {
            scenario: scenario.into(),
        }
    }

    pub fn assertion_failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn fixture(fixture: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fixture {
            fixture: fixture.into(),
            message: message.into(),
        }
    }
}
