//! Value types and record shapes.
//!
//! A `ValueType` describes the static shape of an expression or a query
//! element. Records are named, ordered field lists shared behind `Arc`.

use std::fmt;
use std::sync::Arc;

use crate::Value;

/// The static type of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// The type of the `null` literal.
    Null,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    /// Milliseconds since Unix epoch.
    Timestamp,
    Record(Arc<RecordType>),
    List(Box<ValueType>),
}

impl ValueType {
    /// Returns true for integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Int32 | ValueType::Int64 | ValueType::Float32 | ValueType::Float64
        )
    }

    /// Returns true for integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, ValueType::Int32 | ValueType::Int64)
    }

    /// Returns true if `null` is a valid value of this type.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            ValueType::Null | ValueType::String | ValueType::Record(_) | ValueType::List(_)
        )
    }

    /// The default value of this type: zero for numbers, `false` for
    /// booleans, the epoch for timestamps, and `null` for everything else.
    pub fn zero_value(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int32 => Value::Int32(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::Float32 => Value::Float32(0.0),
            ValueType::Float64 => Value::Float64(0.0),
            ValueType::Timestamp => Value::Timestamp(0),
            ValueType::Null | ValueType::String | ValueType::Record(_) | ValueType::List(_) => {
                Value::Null
            }
        }
    }

    /// Get the record shape if this is a record type.
    pub fn as_record(&self) -> Option<&Arc<RecordType>> {
        match self {
            ValueType::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> String {
        match self {
            ValueType::Null => "Null".to_string(),
            ValueType::Bool => "Bool".to_string(),
            ValueType::Int32 => "Int32".to_string(),
            ValueType::Int64 => "Int64".to_string(),
            ValueType::Float32 => "Float32".to_string(),
            ValueType::Float64 => "Float64".to_string(),
            ValueType::String => "String".to_string(),
            ValueType::Timestamp => "Timestamp".to_string(),
            ValueType::Record(r) => r.name().to_string(),
            ValueType::List(item) => format!("List<{}>", item.name()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: ValueType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A record shape: a name and an ordered list of fields.
///
/// Construct expressions bind their positional arguments to the first
/// fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    name: String,
    fields: Vec<Field>,
}

impl RecordType {
    /// Create a new record type.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
