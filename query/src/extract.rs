//! Typed extraction of aggregate results.

use sieve_core::Value;

use crate::{QueryError, QueryResult};

/// Conversion from a result [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> QueryResult<Self>;
}

fn mismatch(value: &Value, to: &str) -> QueryError {
    QueryError::coercion_failure(value.type_name(), to)
}

impl FromValue for Value {
    fn from_value(value: Value) -> QueryResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> QueryResult<Self> {
        value.as_bool().ok_or_else(|| mismatch(&value, "Bool"))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Int32(n) => Ok(n),
            Value::Int64(n) => i32::try_from(n).map_err(|_| mismatch(&value, "Int32")),
            other => Err(mismatch(&other, "Int32")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Int32(_) | Value::Int64(_) | Value::Timestamp(_) => value
                .as_i64()
                .or_else(|| value.as_timestamp())
                .ok_or_else(|| mismatch(&value, "Int64")),
            other => Err(mismatch(&other, "Int64")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> QueryResult<Self> {
        value.as_f64().ok_or_else(|| mismatch(&value, "Float64"))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Float32(f) => Ok(f),
            Value::Float64(f) => Ok(f as f32),
            Value::Int32(n) => Ok(n as f32),
            other => Err(mismatch(&other, "Float32")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(&other, "String")),
        }
    }
}

/// Null becomes `None`.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> QueryResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
