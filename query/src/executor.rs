//! Query execution.
//!
//! The primitive executor computes an [`Aggregate`] by iterating a query
//! through its backend. First, Any and their variants read at most one row;
//! Single reads at most two. Count, Sum and Average need every row and only
//! run when the backend allows expensive aggregates.

use futures::StreamExt;
use sieve_core::{Value, ValueType};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::aggregates::{fallback, resolve, short_circuit, Aggregate, Resolution, Terminal};
use crate::boundary::{Backend, RowIter, RowStream};
use crate::node::Query;
use crate::{QueryError, QueryResult};

fn unsupported(aggregate: Aggregate) -> QueryError {
    QueryError::not_supported(
        aggregate.name(),
        "this aggregate is not supported for this query by this backend; \
         materializing the rows first (to_list) may work, but can involve \
         fetching large quantities of data",
    )
}

fn zero_or_empty(query: &Query, aggregate: Aggregate) -> Option<QueryResult<Value>> {
    let result_type = match aggregate {
        Aggregate::Count => ValueType::Int64,
        _ => query.element_type(),
    };
    short_circuit(query, aggregate, &result_type)
}

/// Compute a primitive aggregate by iterating the query.
pub fn execute_primitive<B: Backend + ?Sized>(
    backend: &B,
    query: &Query,
    aggregate: Aggregate,
) -> QueryResult<Value> {
    if let Some(outcome) = zero_or_empty(query, aggregate) {
        return outcome;
    }
    if let Some((rewritten, aggregate)) = fallback(query, aggregate)? {
        return backend.execute_aggregate(&rewritten, aggregate);
    }
    match aggregate {
        Aggregate::First | Aggregate::FirstOrDefault => {
            let limited = query.take_rows(1).remove_distinct_if_no_skip();
            let mut rows = backend.iterate(&limited)?;
            match next_row(&mut rows)? {
                Some(value) => Ok(value),
                None if aggregate == Aggregate::First => Err(QueryError::EmptyResult),
                None => Ok(query.element_type().zero_value()),
            }
        }
        Aggregate::Single | Aggregate::SingleOrDefault => {
            let limited = query.take_rows(2);
            let mut rows = backend.iterate(&limited)?;
            let value = match next_row(&mut rows)? {
                Some(value) => value,
                None if aggregate == Aggregate::Single => return Err(QueryError::EmptyResult),
                None => return Ok(query.element_type().zero_value()),
            };
            if next_row(&mut rows)?.is_some() {
                return Err(QueryError::MultipleResults);
            }
            Ok(value)
        }
        Aggregate::Any | Aggregate::NotAny => {
            let limited = query.take_rows(1).remove_distinct_if_no_skip();
            let mut rows = backend.iterate(&limited)?;
            let any = next_row(&mut rows)?.is_some();
            Ok(Value::Bool(any == (aggregate == Aggregate::Any)))
        }
        Aggregate::Count | Aggregate::Sum | Aggregate::Average
            if backend.allows_expensive_aggregates() =>
        {
            debug!(aggregate = %aggregate, backend = backend.name(), "full scan");
            let mut rows = backend.iterate(query)?;
            let mut acc = Accumulator::new(aggregate, query.element_type());
            while let Some(value) = next_row(&mut rows)? {
                acc.add(&value)?;
            }
            acc.finish()
        }
        _ => Err(unsupported(aggregate)),
    }
}

/// Compute a primitive aggregate by streaming the query. Cancellation is
/// checked before each row is read.
pub async fn execute_primitive_async<B: Backend + ?Sized>(
    backend: &B,
    query: &Query,
    aggregate: Aggregate,
    cancel: CancellationToken,
) -> QueryResult<Value> {
    if let Some(outcome) = zero_or_empty(query, aggregate) {
        return outcome;
    }
    if let Some((rewritten, aggregate)) = fallback(query, aggregate)? {
        return backend
            .execute_aggregate_async(&rewritten, aggregate, cancel)
            .await;
    }
    match aggregate {
        Aggregate::First | Aggregate::FirstOrDefault => {
            let limited = query.take_rows(1).remove_distinct_if_no_skip();
            let mut rows = backend.iterate_async(&limited, cancel.clone())?;
            match next_row_async(&mut rows, &cancel).await? {
                Some(value) => Ok(value),
                None if aggregate == Aggregate::First => Err(QueryError::EmptyResult),
                None => Ok(query.element_type().zero_value()),
            }
        }
        Aggregate::Single | Aggregate::SingleOrDefault => {
            let limited = query.take_rows(2);
            let mut rows = backend.iterate_async(&limited, cancel.clone())?;
            let value = match next_row_async(&mut rows, &cancel).await? {
                Some(value) => value,
                None if aggregate == Aggregate::Single => return Err(QueryError::EmptyResult),
                None => return Ok(query.element_type().zero_value()),
            };
            if next_row_async(&mut rows, &cancel).await?.is_some() {
                return Err(QueryError::MultipleResults);
            }
            Ok(value)
        }
        Aggregate::Any | Aggregate::NotAny => {
            let limited = query.take_rows(1).remove_distinct_if_no_skip();
            let mut rows = backend.iterate_async(&limited, cancel.clone())?;
            let any = next_row_async(&mut rows, &cancel).await?.is_some();
            Ok(Value::Bool(any == (aggregate == Aggregate::Any)))
        }
        Aggregate::Count | Aggregate::Sum | Aggregate::Average
            if backend.allows_expensive_aggregates() =>
        {
            debug!(aggregate = %aggregate, backend = backend.name(), "full scan");
            let mut rows = backend.iterate_async(query, cancel.clone())?;
            let mut acc = Accumulator::new(aggregate, query.element_type());
            while let Some(value) = next_row_async(&mut rows, &cancel).await? {
                acc.add(&value)?;
            }
            acc.finish()
        }
        _ => Err(unsupported(aggregate)),
    }
}

fn next_row(rows: &mut RowIter<'_>) -> QueryResult<Option<Value>> {
    let row = rows.next().transpose()?;
    if let Some(value) = &row {
        trace!(%value, "row");
    }
    Ok(row)
}

async fn next_row_async(
    rows: &mut RowStream<'_>,
    cancel: &CancellationToken,
) -> QueryResult<Option<Value>> {
    if cancel.is_cancelled() {
        return Err(QueryError::Cancelled);
    }
    let row = rows.next().await.transpose()?;
    if let Some(value) = &row {
        trace!(%value, "row");
    }
    Ok(row)
}

/// Running state for the full-scan aggregates.
struct Accumulator {
    aggregate: Aggregate,
    element_type: ValueType,
    count: i64,
    int_sum: i64,
    float_sum: f64,
}

impl Accumulator {
    fn new(aggregate: Aggregate, element_type: ValueType) -> Self {
        Self {
            aggregate,
            element_type,
            count: 0,
            int_sum: 0,
            float_sum: 0.0,
        }
    }

    fn add(&mut self, value: &Value) -> QueryResult<()> {
        self.count = self
            .count
            .checked_add(1)
            .ok_or_else(|| QueryError::coercion_failure("count", "Int64"))?;
        if self.aggregate == Aggregate::Count {
            return Ok(());
        }
        if self.element_type.is_integer() {
            let n = value
                .as_i64()
                .ok_or_else(|| QueryError::coercion_failure(value.type_name(), "Int64"))?;
            self.int_sum = self
                .int_sum
                .checked_add(n)
                .ok_or_else(|| QueryError::coercion_failure("sum", "Int64"))?;
        } else {
            let f = value
                .as_f64()
                .ok_or_else(|| QueryError::coercion_failure(value.type_name(), "Float64"))?;
            self.float_sum += f;
        }
        Ok(())
    }

    fn finish(self) -> QueryResult<Value> {
        match self.aggregate {
            Aggregate::Count => Ok(Value::Int64(self.count)),
            Aggregate::Sum if self.element_type.is_integer() => {
                Ok(Value::Int64(self.int_sum).convert_checked(&self.element_type)?)
            }
            Aggregate::Sum => Ok(Value::Float64(self.float_sum).convert(&self.element_type)?),
            _ => {
                if self.count == 0 {
                    return Err(QueryError::EmptyResult);
                }
                let total = if self.element_type.is_integer() {
                    self.int_sum as f64
                } else {
                    self.float_sum
                };
                let mean = Value::Float64(total / self.count as f64);
                if self.element_type == ValueType::Float32 {
                    Ok(mean.convert(&ValueType::Float32)?)
                } else {
                    Ok(mean)
                }
            }
        }
    }
}

/// Convert a backend result to the type the terminal promised.
fn coerce_result(value: Value, result_type: &ValueType) -> QueryResult<Value> {
    if value.is_instance_of(result_type) {
        return Ok(value);
    }
    Ok(value.convert_checked(result_type)?)
}

impl Query {
    /// Iterate the rows of this query.
    pub fn iterate(&self) -> QueryResult<RowIter<'_>> {
        self.backend().iterate(self)
    }

    /// Stream the rows of this query.
    pub fn iterate_async(&self, cancel: CancellationToken) -> QueryResult<RowStream<'_>> {
        self.backend().iterate_async(self, cancel)
    }

    /// Read every row.
    pub fn to_list(&self) -> QueryResult<Vec<Value>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = self.iterate()?;
        let mut out = Vec::new();
        while let Some(value) = next_row(&mut rows)? {
            out.push(value);
        }
        Ok(out)
    }

    /// Read every row without blocking.
    pub async fn to_list_async(&self, cancel: CancellationToken) -> QueryResult<Vec<Value>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = self.iterate_async(cancel.clone())?;
        let mut out = Vec::new();
        while let Some(value) = next_row_async(&mut rows, &cancel).await? {
            out.push(value);
        }
        Ok(out)
    }

    /// Run a terminal operation.
    pub fn execute(&self, terminal: Terminal) -> QueryResult<Value> {
        match resolve(self, terminal)? {
            Resolution::Done(value) => Ok(value),
            Resolution::Execute(resolved) => {
                let backend = resolved.query.backend();
                let value = backend.execute_aggregate(&resolved.query, resolved.aggregate)?;
                coerce_result(value, &resolved.result_type)
            }
        }
    }

    /// Run a terminal operation without blocking.
    pub async fn execute_async(
        &self,
        terminal: Terminal,
        cancel: CancellationToken,
    ) -> QueryResult<Value> {
        match resolve(self, terminal)? {
            Resolution::Done(value) => Ok(value),
            Resolution::Execute(resolved) => {
                if cancel.is_cancelled() {
                    return Err(QueryError::Cancelled);
                }
                let backend = resolved.query.backend();
                let value = backend
                    .execute_aggregate_async(&resolved.query, resolved.aggregate, cancel)
                    .await?;
                coerce_result(value, &resolved.result_type)
            }
        }
    }
}
