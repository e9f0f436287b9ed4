//! An in-memory backend.
//!
//! Runs queries over a vector of values with the reference pipeline:
//! filter, order, project, distinct, skip, take.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use sieve_core::{Value, ValueType};
use sieve_expr::Evaluator;
use sieve_query::{
    Aggregate, Backend, OrderClause, Query, QueryResult, RowIter, ValueReader,
};
use tracing::debug;

use crate::transport::{Reply, ReplyReader};

/// A backend serving rows from memory.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    origin: ValueType,
    rows: Vec<Value>,
    expensive_aggregates: bool,
    rows_read: AtomicUsize,
}

impl MemoryBackend {
    /// Create a backend serving `rows` of type `origin`.
    pub fn new(origin: ValueType, rows: Vec<Value>) -> Self {
        Self {
            name: "memory".to_string(),
            origin,
            rows,
            expensive_aggregates: false,
            rows_read: AtomicUsize::new(0),
        }
    }

    /// Decode rows from transport replies.
    pub fn from_replies(origin: ValueType, replies: &[Reply]) -> QueryResult<Self> {
        let reader = ReplyReader;
        let rows = replies
            .iter()
            .map(|reply| reader.read_as(reply, &origin))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self::new(origin, rows))
    }

    /// Allow full scans for Count, Sum and Average.
    pub fn with_expensive_aggregates(mut self, allow: bool) -> Self {
        self.expensive_aggregates = allow;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// A query over every row.
    pub fn query(self: &Arc<Self>) -> Query {
        Query::new(self.clone(), self.origin.clone())
    }

    /// Rows handed out so far, across all iterations.
    pub fn rows_read(&self) -> usize {
        self.rows_read.load(AtomicOrdering::SeqCst)
    }

    pub fn reset_rows_read(&self) {
        self.rows_read.store(0, AtomicOrdering::SeqCst);
    }

    fn run(&self, query: &Query) -> QueryResult<Vec<Value>> {
        let evaluator = Evaluator::new();

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let keep = match query.predicate() {
                Some(predicate) => evaluator.test(predicate, row.clone())?,
                None => true,
            };
            if keep {
                rows.push(row.clone());
            }
        }

        let clauses = query.order_clauses();
        if !clauses.is_empty() {
            let mut keyed = Vec::with_capacity(rows.len());
            for row in rows {
                keyed.push((sort_keys(&evaluator, &clauses, &row)?, row));
            }
            keyed.sort_by(|(a, _), (b, _)| compare_keys(&clauses, a, b));
            rows = keyed.into_iter().map(|(_, row)| row).collect();
        }

        if let Some(projection) = query.projection() {
            rows = rows
                .into_iter()
                .map(|row| evaluator.apply(projection, row))
                .collect::<Result<_, _>>()?;
        }

        if query.is_distinct() {
            let mut unique: Vec<Value> = Vec::with_capacity(rows.len());
            for row in rows {
                if !unique.contains(&row) {
                    unique.push(row);
                }
            }
            rows = unique;
        }

        let skip = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let take = query
            .limit()
            .map(|t| usize::try_from(t).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(skip).take(take).collect())
    }
}

fn sort_keys(
    evaluator: &Evaluator,
    clauses: &[OrderClause],
    row: &Value,
) -> QueryResult<Vec<Value>> {
    let mut keys = Vec::with_capacity(clauses.len());
    for clause in clauses {
        keys.push(evaluator.apply(&clause.expr, row.clone())?);
    }
    Ok(keys)
}

fn compare_keys(clauses: &[OrderClause], a: &[Value], b: &[Value]) -> Ordering {
    for ((clause, left), right) in clauses.iter().zip(a).zip(b) {
        let ordering = left.cmp_sortable(right);
        let ordering = if clause.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn allows_expensive_aggregates(&self) -> bool {
        self.expensive_aggregates
    }

    fn iterate<'a>(&'a self, query: &'a Query) -> QueryResult<RowIter<'a>> {
        let rows = self.run(query)?;
        debug!(backend = %self.name, rows = rows.len(), "materialized rows");
        Ok(Box::new(rows.into_iter().map(move |row| {
            self.rows_read.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(row)
        })))
    }

    fn try_render(&self, query: &Query, aggregate: Option<Aggregate>) -> Option<String> {
        if aggregate.is_some() {
            return None;
        }
        let mut parts = vec![format!("from {}", self.name)];
        if let Some(predicate) = query.predicate() {
            parts.push(format!("where {}", predicate));
        }
        let clauses = query.order_clauses();
        if !clauses.is_empty() {
            let clauses: Vec<String> = clauses.iter().map(|c| c.to_string()).collect();
            parts.push(format!("order by {}", clauses.join(", ")));
        }
        if let Some(projection) = query.projection() {
            let verb = if query.is_distinct() {
                "select distinct"
            } else {
                "select"
            };
            parts.push(format!("{} {}", verb, projection));
        }
        if query.offset() > 0 {
            parts.push(format!("skip {}", query.offset()));
        }
        if let Some(take) = query.limit() {
            parts.push(format!("take {}", take));
        }
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{blap, foo_backend};
    use sieve_query::QueryAlgebra;

    #[test]
    fn test_pipeline_order() {
        // GIVEN
        let backend = foo_backend().unwrap();
        let query = backend
            .query()
            .select(&blap().unwrap())
            .and_then(|q| q.order_by_descending(&sieve_expr::Lambda::identity(ValueType::Int32)))
            .and_then(|q| q.skip(1))
            .and_then(|q| q.take(2))
            .unwrap();

        // WHEN
        let rows = query.to_list().unwrap();

        // THEN
        assert_eq!(rows, vec![Value::Int32(2), Value::Int32(1)]);
    }

    #[test]
    fn test_render_describes_query() {
        let backend = foo_backend().unwrap();
        let query = backend.query().select(&blap().unwrap()).and_then(|q| q.take(3)).unwrap();

        assert_eq!(query.to_string(), "from memory select f => f.Blap take 3");
    }

    #[test]
    fn test_rows_read_counts_pulled_rows() {
        let backend = foo_backend().unwrap();
        let query = backend.query();

        query.first().unwrap();

        assert_eq!(backend.rows_read(), 1);
    }
}
