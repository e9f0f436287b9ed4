//! The execution boundary.
//!
//! A [`Backend`] turns a finalized [`Query`] into rows or a single
//! aggregate value. Everything a backend needs is reachable from the query
//! node itself: predicate, projection, order clauses, skip/take, distinct,
//! and the opaque [`BackendState`] it attached when the query was created.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sieve_core::{Record, Value, ValueType};
use tokio_util::sync::CancellationToken;

use crate::aggregates::Aggregate;
use crate::executor::{execute_primitive, execute_primitive_async};
use crate::node::Query;
use crate::{QueryError, QueryResult};

/// Opaque per-query state owned by a backend.
pub type BackendState = Arc<dyn Any + Send + Sync>;

/// Blocking row iterator.
pub type RowIter<'a> = Box<dyn Iterator<Item = QueryResult<Value>> + Send + 'a>;

/// Suspendable row stream.
pub type RowStream<'a> = BoxStream<'a, QueryResult<Value>>;

/// A backend that can run queries.
///
/// Only [`Backend::iterate`] is required. The aggregate entry points default
/// to the primitive executor, which reads at most two rows for the
/// First/Single/Any family and gates full scans on
/// [`Backend::allows_expensive_aggregates`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used when no rendering is available.
    fn name(&self) -> &str {
        "query"
    }

    /// Whether full scans (Count, Sum, Average) may be run element by element.
    fn allows_expensive_aggregates(&self) -> bool {
        false
    }

    /// Iterate the rows of a query.
    fn iterate<'a>(&'a self, query: &'a Query) -> QueryResult<RowIter<'a>>;

    /// Iterate the rows of a query as a stream.
    fn iterate_async<'a>(
        &'a self,
        query: &'a Query,
        _cancel: CancellationToken,
    ) -> QueryResult<RowStream<'a>> {
        let rows = self.iterate(query)?;
        Ok(stream::iter(rows).boxed())
    }

    /// Compute a primitive aggregate.
    fn execute_aggregate(&self, query: &Query, aggregate: Aggregate) -> QueryResult<Value> {
        execute_primitive(self, query, aggregate)
    }

    /// Compute a primitive aggregate without blocking.
    async fn execute_aggregate_async(
        &self,
        query: &Query,
        aggregate: Aggregate,
        cancel: CancellationToken,
    ) -> QueryResult<Value> {
        execute_primitive_async(self, query, aggregate, cancel).await
    }

    /// Human-readable form of a query, if the backend has one.
    fn try_render(&self, _query: &Query, _aggregate: Option<Aggregate>) -> Option<String> {
        None
    }
}

/// A backend that cannot run anything. Useful for composing and rendering
/// queries without a data source.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn iterate<'a>(&'a self, _query: &'a Query) -> QueryResult<RowIter<'a>> {
        Err(QueryError::not_supported(
            "Iterate",
            "the null backend has no rows to produce",
        ))
    }
}

/// Decodes raw transport replies into values.
///
/// Implemented by a backend's transport layer. Only the scalar and array
/// primitives are required; typed reads are built on top of them.
pub trait ValueReader {
    type Raw;

    fn is_null(&self, raw: &Self::Raw) -> bool;

    fn read_i64(&self, raw: &Self::Raw) -> QueryResult<i64>;

    fn read_f64(&self, raw: &Self::Raw) -> QueryResult<f64>;

    fn read_string(&self, raw: &Self::Raw) -> QueryResult<String>;

    fn is_array(&self, raw: &Self::Raw) -> bool;

    fn array_len(&self, raw: &Self::Raw) -> usize;

    fn array_item<'r>(&self, raw: &'r Self::Raw, index: usize) -> Option<&'r Self::Raw>;

    fn read_i32(&self, raw: &Self::Raw) -> QueryResult<i32> {
        let wide = self.read_i64(raw)?;
        i32::try_from(wide).map_err(|_| QueryError::coercion_failure("Int64", "Int32"))
    }

    fn read_f32(&self, raw: &Self::Raw) -> QueryResult<f32> {
        Ok(self.read_f64(raw)? as f32)
    }

    fn read_bool(&self, raw: &Self::Raw) -> QueryResult<bool> {
        Ok(self.read_i64(raw)? != 0)
    }

    /// Timestamps travel as milliseconds since the epoch.
    fn read_timestamp(&self, raw: &Self::Raw) -> QueryResult<i64> {
        self.read_i64(raw)
    }

    /// Append every item of an array reply to `out`, read as `item_type`.
    /// Returns the number of items copied.
    fn copy_array_to(
        &self,
        raw: &Self::Raw,
        item_type: &ValueType,
        out: &mut Vec<Value>,
    ) -> QueryResult<usize> {
        if !self.is_array(raw) {
            return Err(QueryError::coercion_failure("scalar", "array"));
        }
        let len = self.array_len(raw);
        out.reserve(len);
        for index in 0..len {
            let item = self
                .array_item(raw, index)
                .ok_or_else(|| QueryError::backend(format!("array item {} missing", index)))?;
            out.push(self.read_as(item, item_type)?);
        }
        Ok(len)
    }

    /// Read a reply as a value of the given type. Records are read from an
    /// array reply holding one item per field, in declaration order.
    fn read_as(&self, raw: &Self::Raw, ty: &ValueType) -> QueryResult<Value> {
        if self.is_null(raw) {
            return if ty.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(QueryError::coercion_failure("Null", ty.name()))
            };
        }
        let value = match ty {
            ValueType::Null => Value::Null,
            ValueType::Bool => Value::Bool(self.read_bool(raw)?),
            ValueType::Int32 => Value::Int32(self.read_i32(raw)?),
            ValueType::Int64 => Value::Int64(self.read_i64(raw)?),
            ValueType::Float32 => Value::Float32(self.read_f32(raw)?),
            ValueType::Float64 => Value::Float64(self.read_f64(raw)?),
            ValueType::String => Value::String(self.read_string(raw)?),
            ValueType::Timestamp => Value::Timestamp(self.read_timestamp(raw)?),
            ValueType::List(item_type) => {
                let mut items = Vec::new();
                self.copy_array_to(raw, item_type, &mut items)?;
                Value::List(items)
            }
            ValueType::Record(record_type) => {
                if !self.is_array(raw) {
                    return Err(QueryError::coercion_failure("scalar", ty.name()));
                }
                let mut values = Vec::with_capacity(record_type.fields().len());
                for (index, field) in record_type.fields().iter().enumerate() {
                    let value = match self.array_item(raw, index) {
                        Some(item) => self.read_as(item, &field.ty)?,
                        None => field.ty.zero_value(),
                    };
                    values.push(value);
                }
                Value::Record(Record::new(record_type.clone(), values)?)
            }
        };
        Ok(value)
    }
}
