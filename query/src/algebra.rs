//! The fluent query surface shared by plain and decorated queries.

use sieve_core::Value;
use sieve_expr::Lambda;

use crate::aggregates::{Index, Terminal};
use crate::extract::FromValue;
use crate::node::Query;
use crate::QueryResult;

/// Query composition and terminal operations.
///
/// Implementors supply the `apply_*` primitives and access to the
/// underlying [`Query`]; everything else is provided.
pub trait QueryAlgebra: Sized {
    /// The underlying query node.
    fn query(&self) -> &Query;

    fn apply_where(&self, predicate: &Lambda) -> QueryResult<Self>;

    fn apply_skip(&self, n: i64) -> QueryResult<Self>;

    fn apply_take(&self, n: i64) -> QueryResult<Self>;

    fn apply_order_by(&self, key: &Lambda, new_group: bool, ascending: bool)
        -> QueryResult<Self>;

    fn apply_reverse(&self) -> QueryResult<Self>;

    fn apply_select(&self, projection: &Lambda) -> QueryResult<Self>;

    fn apply_distinct(&self, distinct: bool) -> QueryResult<Self>;

    /// True if both refer to the same query node.
    fn same_as(&self, other: &Self) -> bool {
        self.query().same_as(other.query())
    }

    // ==================== Composition ====================

    fn filter(&self, predicate: &Lambda) -> QueryResult<Self> {
        self.apply_where(predicate)
    }

    fn skip(&self, n: i64) -> QueryResult<Self> {
        self.apply_skip(n)
    }

    fn take(&self, n: i64) -> QueryResult<Self> {
        self.apply_take(n)
    }

    fn order_by(&self, key: &Lambda) -> QueryResult<Self> {
        self.apply_order_by(key, true, true)
    }

    fn order_by_descending(&self, key: &Lambda) -> QueryResult<Self> {
        self.apply_order_by(key, true, false)
    }

    fn then_by(&self, key: &Lambda) -> QueryResult<Self> {
        self.apply_order_by(key, false, true)
    }

    fn then_by_descending(&self, key: &Lambda) -> QueryResult<Self> {
        self.apply_order_by(key, false, false)
    }

    fn reverse(&self) -> QueryResult<Self> {
        self.apply_reverse()
    }

    fn select(&self, projection: &Lambda) -> QueryResult<Self> {
        self.apply_select(projection)
    }

    fn distinct(&self) -> QueryResult<Self> {
        self.apply_distinct(true)
    }

    // ==================== Terminals ====================

    fn to_list(&self) -> QueryResult<Vec<Value>> {
        self.query().to_list()
    }

    /// Run a terminal and extract the result as `T`.
    fn execute_as<T: FromValue>(&self, terminal: Terminal) -> QueryResult<T> {
        T::from_value(self.query().execute(terminal)?)
    }

    fn count(&self) -> QueryResult<i32> {
        self.execute_as(Terminal::Count(None))
    }

    fn long_count(&self) -> QueryResult<i64> {
        self.execute_as(Terminal::LongCount(None))
    }

    fn any(&self) -> QueryResult<bool> {
        self.execute_as(Terminal::Any(None))
    }

    fn all(&self, predicate: &Lambda) -> QueryResult<bool> {
        self.execute_as(Terminal::All(predicate.clone()))
    }

    fn first(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::First(None))
    }

    fn first_or_default(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::FirstOrDefault(None))
    }

    fn single(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::Single(None))
    }

    fn single_or_default(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::SingleOrDefault(None))
    }

    fn last(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::Last(None))
    }

    fn last_or_default(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::LastOrDefault(None))
    }

    fn min(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::Min(None))
    }

    fn max(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::Max(None))
    }

    fn sum(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::Sum(None))
    }

    fn average(&self) -> QueryResult<Value> {
        self.execute_as(Terminal::Average(None))
    }

    fn element_at(&self, index: Index) -> QueryResult<Value> {
        self.execute_as(Terminal::ElementAt(index))
    }

    fn element_at_or_default(&self, index: Index) -> QueryResult<Value> {
        self.execute_as(Terminal::ElementAtOrDefault(index))
    }

    fn contains(&self, value: impl Into<Value>) -> QueryResult<bool> {
        self.execute_as(Terminal::Contains(value.into()))
    }
}

impl QueryAlgebra for Query {
    fn query(&self) -> &Query {
        self
    }

    fn apply_where(&self, predicate: &Lambda) -> QueryResult<Self> {
        Query::apply_where(self, predicate)
    }

    fn apply_skip(&self, n: i64) -> QueryResult<Self> {
        Query::apply_skip(self, n)
    }

    fn apply_take(&self, n: i64) -> QueryResult<Self> {
        Query::apply_take(self, n)
    }

    fn apply_order_by(
        &self,
        key: &Lambda,
        new_group: bool,
        ascending: bool,
    ) -> QueryResult<Self> {
        Query::apply_order_by(self, key, new_group, ascending)
    }

    fn apply_reverse(&self) -> QueryResult<Self> {
        Query::apply_reverse(self)
    }

    fn apply_select(&self, projection: &Lambda) -> QueryResult<Self> {
        Query::apply_select(self, projection)
    }

    fn apply_distinct(&self, distinct: bool) -> QueryResult<Self> {
        Query::apply_distinct(self, distinct)
    }
}
