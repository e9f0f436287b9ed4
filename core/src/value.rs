//! Runtime values.
//!
//! Values are what expressions evaluate to and what backends hand back
//! for each query element. Sieve supports scalar types (Bool, the integer
//! and float widths, String, Timestamp) and composite types (Record, List).

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::{CoreError, CoreResult, RecordType, ValueType};

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null/missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp as milliseconds since Unix epoch.
    Timestamp(i64),
    /// Instance of a record type.
    Record(Record),
    /// List of values.
    List(Vec<Value>),
}

/// An instance of a [`RecordType`], with one value per declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: Arc<RecordType>,
    values: Vec<Value>,
}

impl Record {
    /// Create a record, checking that every field has a value.
    pub fn new(ty: Arc<RecordType>, values: Vec<Value>) -> CoreResult<Self> {
        if values.len() != ty.fields().len() {
            return Err(CoreError::record_arity(
                ty.name(),
                ty.fields().len(),
                values.len(),
            ));
        }
        Ok(Self { ty, values })
    }

    pub fn ty(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.field_index(name).and_then(|i| self.values.get(i))
    }
}

impl Value {
    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for any integer or float value.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_)
        )
    }

    /// Get as boolean if this is a Bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 if this is an Int32 value.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64 if this is an integer value of either width.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is any numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            Value::Float32(f) => Some(f64::from(*f)),
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string reference if this is a String value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as timestamp if this is a Timestamp value.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Get as record if this is a Record value.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get as list if this is a List value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::String(_) => "String",
            Value::Timestamp(_) => "Timestamp",
            Value::Record(_) => "Record",
            Value::List(_) => "List",
        }
    }

    /// Whether this value is an instance of `ty`. Null belongs to every
    /// nullable type.
    pub fn is_instance_of(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::Null, t) => t.is_nullable(),
            (Value::Bool(_), ValueType::Bool)
            | (Value::Int32(_), ValueType::Int32)
            | (Value::Int64(_), ValueType::Int64)
            | (Value::Float32(_), ValueType::Float32)
            | (Value::Float64(_), ValueType::Float64)
            | (Value::String(_), ValueType::String)
            | (Value::Timestamp(_), ValueType::Timestamp) => true,
            (Value::Record(r), ValueType::Record(t)) => r.ty() == t,
            (Value::List(items), ValueType::List(item)) => {
                items.iter().all(|v| v.is_instance_of(item))
            }
            _ => false,
        }
    }

    /// Convert to `ty` the way an unchecked cast does: integer narrowing
    /// wraps, float to integer saturates.
    pub fn convert(&self, ty: &ValueType) -> CoreResult<Value> {
        if self.is_instance_of(ty) {
            return Ok(self.clone());
        }
        let converted = match (self, ty) {
            (Value::Int32(i), _) => numeric_from_i64(i64::from(*i), ty),
            (Value::Int64(i), _) => numeric_from_i64(*i, ty),
            (Value::Float32(f), _) => numeric_from_f64(f64::from(*f), ty),
            (Value::Float64(f), _) => numeric_from_f64(*f, ty),
            (Value::Timestamp(t), ValueType::Int64) => Some(Value::Int64(*t)),
            _ => None,
        };
        converted.ok_or_else(|| CoreError::coercion(self.type_name(), ty.name()))
    }

    /// Convert to `ty`, failing instead of wrapping when an integer does
    /// not fit the target width.
    pub fn convert_checked(&self, ty: &ValueType) -> CoreResult<Value> {
        let fail = || CoreError::coercion(self.type_name(), ty.name());
        match (self, ty) {
            (Value::Int64(i), ValueType::Int32) => {
                i32::try_from(*i).map(Value::Int32).map_err(|_| fail())
            }
            (Value::Float32(_) | Value::Float64(_), ValueType::Int32 | ValueType::Int64) => {
                let f = self.as_f64().ok_or_else(fail)?;
                if !f.is_finite() {
                    return Err(fail());
                }
                let truncated = f.trunc();
                match ty {
                    ValueType::Int32
                        if truncated >= f64::from(i32::MIN) && truncated <= f64::from(i32::MAX) =>
                    {
                        Ok(Value::Int32(truncated as i32))
                    }
                    ValueType::Int64
                        if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 =>
                    {
                        Ok(Value::Int64(truncated as i64))
                    }
                    _ => Err(fail()),
                }
            }
            _ => self.convert(ty),
        }
    }

    /// Compare values for sorting. Null is treated as less than any other value.
    /// Numbers compare across widths; values of unrelated types return Equal
    /// (stable sort behavior).
    pub fn cmp_sortable(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => Ordering::Equal,
                }
            }
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Record(a), Value::Record(b)) => cmp_sequences(a.values(), b.values()),
            (Value::List(a), Value::List(b)) => cmp_sequences(a, b),
            _ => Ordering::Equal,
        }
    }
}

fn cmp_sequences(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let cmp = x.cmp_sortable(y);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    a.len().cmp(&b.len())
}

fn numeric_from_i64(i: i64, ty: &ValueType) -> Option<Value> {
    match ty {
        ValueType::Int32 => Some(Value::Int32(i as i32)),
        ValueType::Int64 => Some(Value::Int64(i)),
        ValueType::Float32 => Some(Value::Float32(i as f32)),
        ValueType::Float64 => Some(Value::Float64(i as f64)),
        ValueType::Timestamp => Some(Value::Timestamp(i)),
        _ => None,
    }
}

fn numeric_from_f64(f: f64, ty: &ValueType) -> Option<Value> {
    match ty {
        ValueType::Int32 => Some(Value::Int32(f as i32)),
        ValueType::Int64 => Some(Value::Int64(f as i64)),
        ValueType::Float32 => Some(Value::Float32(f as f32)),
        ValueType::Float64 => Some(Value::Float64(f)),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float32(fl) => write!(f, "{}", fl),
            Value::Float64(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Timestamp(t) => write!(f, "ts:{}", t),
            Value::Record(r) => {
                write!(f, "{} {{ ", r.ty().name())?;
                for (i, (field, value)) in r.ty().fields().iter().zip(r.values()).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", field.name, value)?;
                }
                write!(f, " }}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Convenient From implementations

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float32(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float64(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}
