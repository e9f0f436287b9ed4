//! Assertion types and builders for verifying step results.

use sieve_core::Value;
use sieve_query::{QueryError, QueryResult};

use crate::error::{HarnessError, HarnessResult};
use crate::scenario::Outcome;

/// A complete assertion for a step result.
#[derive(Default)]
pub struct Assertion {
    // Scalar assertions
    pub value: Option<Value>,

    // Row assertions
    pub rows: Option<usize>,
    pub empty: Option<bool>,
    pub returns: Option<Vec<Value>>,
    pub contains: Vec<Value>,
    pub first: Option<Value>,
    pub last: Option<Value>,

    // Error assertions
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,

    // Custom assertion function
    #[allow(clippy::type_complexity)]
    pub custom: Option<Box<dyn Fn(&Outcome) -> bool + Send + Sync>>,
}

/// The broad class of a [`QueryError`], for assertions that only care
/// which rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidComposition,
    NotSupported,
    EmptyResult,
    MultipleResults,
    CoercionFailure,
    ArgumentError,
    Cancelled,
    Other,
}

impl ErrorKind {
    pub fn of(error: &QueryError) -> Self {
        match error {
            QueryError::InvalidComposition { .. } => Self::InvalidComposition,
            QueryError::NotSupported { .. } => Self::NotSupported,
            QueryError::EmptyResult => Self::EmptyResult,
            QueryError::MultipleResults => Self::MultipleResults,
            QueryError::CoercionFailure { .. } => Self::CoercionFailure,
            QueryError::ArgumentError { .. } => Self::ArgumentError,
            QueryError::Cancelled => Self::Cancelled,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assertion")
            .field("value", &self.value)
            .field("rows", &self.rows)
            .field("empty", &self.empty)
            .field("returns", &self.returns)
            .field("contains", &self.contains)
            .field("error", &self.error)
            .field("error_kind", &self.error_kind)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Assertion {
    /// Create a new empty assertion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify the assertion against a result.
    pub fn verify(&self, step: &str, result: &QueryResult<Outcome>) -> HarnessResult<()> {
        if self.error.is_some() || self.error_kind.is_some() {
            return self.verify_error(step, result);
        }

        let outcome = result.as_ref().map_err(|e| {
            HarnessError::assertion_failed(step, format!("step failed: {}", e))
        })?;

        if let Some(ref custom) = self.custom {
            if !custom(outcome) {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!("custom assertion failed for {}", outcome),
                ));
            }
        }

        match outcome {
            Outcome::Scalar(value) => self.verify_scalar(step, value),
            Outcome::Rows(rows) => self.verify_rows(step, rows),
        }
    }

    fn verify_error(&self, step: &str, result: &QueryResult<Outcome>) -> HarnessResult<()> {
        let error = match result {
            Err(e) => e,
            Ok(outcome) => {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!("expected an error, but step returned {}", outcome),
                ))
            }
        };

        if let Some(kind) = self.error_kind {
            if ErrorKind::of(error) != kind {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!("expected {:?} error, got: {}", kind, error),
                ));
            }
        }

        if let Some(ref expected) = self.error {
            let message = error.to_string();
            if !message.contains(expected) {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!("expected error containing '{}', got: {}", expected, message),
                ));
            }
        }

        Ok(())
    }

    fn verify_scalar(&self, step: &str, value: &Value) -> HarnessResult<()> {
        if let Some(ref expected) = self.value {
            if !values_equal(value, expected) {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!("expected value {}, got {}", format_value(expected), format_value(value)),
                ));
            }
        }

        if self.rows.is_some() || self.returns.is_some() || self.empty.is_some() {
            return Err(HarnessError::assertion_failed(
                step,
                format!("expected rows, got scalar {}", format_value(value)),
            ));
        }

        Ok(())
    }

    fn verify_rows(&self, step: &str, rows: &[Value]) -> HarnessResult<()> {
        if let Some(ref expected) = self.value {
            return Err(HarnessError::assertion_failed(
                step,
                format!(
                    "expected value {}, got {} rows",
                    format_value(expected),
                    rows.len()
                ),
            ));
        }

        if let Some(expected_empty) = self.empty {
            if rows.is_empty() != expected_empty {
                let message = if expected_empty {
                    format!("expected no rows, got {}", rows.len())
                } else {
                    "expected rows, got none".to_string()
                };
                return Err(HarnessError::assertion_failed(step, message));
            }
        }

        if let Some(expected) = self.rows {
            if rows.len() != expected {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!("expected {} rows, got {}", expected, rows.len()),
                ));
            }
        }

        if let Some(ref expected) = self.returns {
            let matches = rows.len() == expected.len()
                && rows.iter().zip(expected).all(|(a, b)| values_equal(a, b));
            if !matches {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!(
                        "expected rows [{}], got [{}]",
                        format_values(expected),
                        format_values(rows)
                    ),
                ));
            }
        }

        for expected in &self.contains {
            if !rows.iter().any(|row| values_equal(row, expected)) {
                return Err(HarnessError::assertion_failed(
                    step,
                    format!(
                        "expected a row {}, got [{}]",
                        format_value(expected),
                        format_values(rows)
                    ),
                ));
            }
        }

        if let Some(ref expected) = self.first {
            match rows.first() {
                Some(row) if values_equal(row, expected) => {}
                other => {
                    return Err(HarnessError::assertion_failed(
                        step,
                        format!(
                            "expected first row {}, got {}",
                            format_value(expected),
                            other.map(format_value).unwrap_or_else(|| "nothing".into())
                        ),
                    ))
                }
            }
        }

        if let Some(ref expected) = self.last {
            match rows.last() {
                Some(row) if values_equal(row, expected) => {}
                other => {
                    return Err(HarnessError::assertion_failed(
                        step,
                        format!(
                            "expected last row {}, got {}",
                            format_value(expected),
                            other.map(format_value).unwrap_or_else(|| "nothing".into())
                        ),
                    ))
                }
            }
        }

        Ok(())
    }
}

/// Builder for creating assertions.
pub struct AssertionBuilder {
    assertion: Assertion,
}

impl AssertionBuilder {
    /// Create a new assertion builder.
    pub fn new() -> Self {
        Self {
            assertion: Assertion::new(),
        }
    }

    /// Build the assertion.
    pub fn build(self) -> Assertion {
        self.assertion
    }

    /// Expect a scalar result.
    pub fn value(mut self, v: impl Into<Value>) -> Self {
        self.assertion.value = Some(v.into());
        self
    }

    /// Expect exactly `n` rows.
    pub fn rows(mut self, n: usize) -> Self {
        self.assertion.rows = Some(n);
        self
    }

    pub fn empty(mut self) -> Self {
        self.assertion.empty = Some(true);
        self
    }

    pub fn not_empty(mut self) -> Self {
        self.assertion.empty = Some(false);
        self
    }

    /// Expect exactly these rows, in this order.
    pub fn returns<V: Into<Value>>(mut self, rows: impl IntoIterator<Item = V>) -> Self {
        self.assertion.returns = Some(rows.into_iter().map(Into::into).collect());
        self
    }

    /// Expect some row equal to `v`.
    pub fn contains(mut self, v: impl Into<Value>) -> Self {
        self.assertion.contains.push(v.into());
        self
    }

    pub fn first(mut self, v: impl Into<Value>) -> Self {
        self.assertion.first = Some(v.into());
        self
    }

    pub fn last(mut self, v: impl Into<Value>) -> Self {
        self.assertion.last = Some(v.into());
        self
    }

    /// Expect an error whose message contains `contains`.
    pub fn error(mut self, contains: impl Into<String>) -> Self {
        self.assertion.error = Some(contains.into());
        self
    }

    /// Expect an error of the given kind.
    pub fn error_kind(mut self, kind: ErrorKind) -> Self {
        self.assertion.error_kind = Some(kind);
        self
    }

    /// Add a custom assertion function.
    pub fn assert_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Outcome) -> bool + Send + Sync + 'static,
    {
        self.assertion.custom = Some(Box::new(f));
        self
    }
}

impl Default for AssertionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two values, allowing a small tolerance between floats.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float64(x), Value::Float64(y)) => (x - y).abs() < 1e-9,
        (Value::Float32(x), Value::Float32(y)) => (x - y).abs() < 1e-5,
        (Value::Float32(x), Value::Float64(y)) | (Value::Float64(y), Value::Float32(x)) => {
            (f64::from(*x) - y).abs() < 1e-5
        }
        _ => a == b,
    }
}

fn format_value(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_matches() {
        let assertion = AssertionBuilder::new().value(4).build();

        assert!(assertion
            .verify("count", &Ok(Outcome::Scalar(Value::Int32(4))))
            .is_ok());
        assert!(assertion
            .verify("count", &Ok(Outcome::Scalar(Value::Int32(5))))
            .is_err());
    }

    #[test]
    fn test_float_tolerance() {
        assert!(values_equal(&Value::Float64(0.1 + 0.2), &Value::Float64(0.3)));
        assert!(values_equal(&Value::Float32(1.5), &Value::Float64(1.5)));
        assert!(!values_equal(&Value::Int32(1), &Value::Int64(1)));
    }

    #[test]
    fn test_rows_in_order() {
        // GIVEN
        let assertion = AssertionBuilder::new()
            .returns([1, 2, 3])
            .first(1)
            .last(3)
            .build();

        // THEN
        let ok = Ok(Outcome::Rows(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]));
        let reordered = Ok(Outcome::Rows(vec![Value::Int32(3), Value::Int32(2), Value::Int32(1)]));
        assert!(assertion.verify("rows", &ok).is_ok());
        assert!(assertion.verify("rows", &reordered).is_err());
    }

    #[test]
    fn test_error_expectation() {
        // GIVEN
        let assertion = AssertionBuilder::new()
            .error_kind(ErrorKind::InvalidComposition)
            .error("after row limits")
            .build();
        let failure = Err(QueryError::invalid_composition(
            "Filters ('Where') cannot be added after row limits ('Skip'/'Take') have been applied",
        ));

        // THEN
        assert!(assertion.verify("where", &failure).is_ok());
        assert!(assertion
            .verify("where", &Ok(Outcome::Scalar(Value::Bool(true))))
            .is_err());
        assert!(assertion
            .verify("where", &Err(QueryError::EmptyResult))
            .is_err());
    }

    #[test]
    fn test_unexpected_failure_is_reported() {
        let assertion = AssertionBuilder::new().rows(2).build();

        let err = assertion
            .verify("rows", &Err(QueryError::EmptyResult))
            .unwrap_err();

        assert!(err.to_string().contains("step failed"));
    }
}
