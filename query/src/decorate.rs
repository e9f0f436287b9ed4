//! Decorated queries.
//!
//! A [`Decorated`] query pairs a [`Query`] with extra data that travels with
//! it through composition. Every algebra call is delegated to the inner
//! query and the result re-wrapped with the same decoration; when the inner
//! query comes back unchanged the decorated query returns itself.

use sieve_core::Value;
use sieve_expr::Lambda;
use tokio_util::sync::CancellationToken;

use crate::aggregates::{Index, Terminal};
use crate::algebra::QueryAlgebra;
use crate::extract::FromValue;
use crate::node::Query;
use crate::QueryResult;

/// A query carrying a decoration.
#[derive(Debug, Clone)]
pub struct Decorated<D> {
    inner: Query,
    decoration: D,
}

impl<D: Clone> Decorated<D> {
    pub fn new(inner: Query, decoration: D) -> Self {
        Self { inner, decoration }
    }

    pub fn inner(&self) -> &Query {
        &self.inner
    }

    pub fn decoration(&self) -> &D {
        &self.decoration
    }

    pub fn into_inner(self) -> Query {
        self.inner
    }

    fn rewrap(&self, inner: QueryResult<Query>) -> QueryResult<Self> {
        let inner = inner?;
        if inner.same_as(&self.inner) {
            return Ok(self.clone());
        }
        Ok(Self {
            inner,
            decoration: self.decoration.clone(),
        })
    }
}

impl<D: Clone> QueryAlgebra for Decorated<D> {
    fn query(&self) -> &Query {
        &self.inner
    }

    fn apply_where(&self, predicate: &Lambda) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_where(predicate))
    }

    fn apply_skip(&self, n: i64) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_skip(n))
    }

    fn apply_take(&self, n: i64) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_take(n))
    }

    fn apply_order_by(
        &self,
        key: &Lambda,
        new_group: bool,
        ascending: bool,
    ) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_order_by(key, new_group, ascending))
    }

    fn apply_reverse(&self) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_reverse())
    }

    fn apply_select(&self, projection: &Lambda) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_select(projection))
    }

    fn apply_distinct(&self, distinct: bool) -> QueryResult<Self> {
        self.rewrap(self.inner.apply_distinct(distinct))
    }
}

/// A query whose terminals run asynchronously under a cancellation token.
pub type AsyncQuery = Decorated<CancellationToken>;

impl AsyncQuery {
    /// Wrap a query with a fresh cancellation token.
    pub fn from_query(inner: Query) -> Self {
        Self::new(inner, CancellationToken::new())
    }

    /// The same query under a different token.
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self::new(self.inner.clone(), cancel)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.decoration
    }

    pub async fn to_list_async(&self) -> QueryResult<Vec<Value>> {
        self.inner.to_list_async(self.decoration.clone()).await
    }

    /// Run a terminal and extract the result as `T`.
    pub async fn execute_as_async<T: FromValue>(&self, terminal: Terminal) -> QueryResult<T> {
        let value = self
            .inner
            .execute_async(terminal, self.decoration.clone())
            .await?;
        T::from_value(value)
    }

    pub async fn count_async(&self) -> QueryResult<i32> {
        self.execute_as_async(Terminal::Count(None)).await
    }

    pub async fn long_count_async(&self) -> QueryResult<i64> {
        self.execute_as_async(Terminal::LongCount(None)).await
    }

    pub async fn any_async(&self) -> QueryResult<bool> {
        self.execute_as_async(Terminal::Any(None)).await
    }

    pub async fn all_async(&self, predicate: &Lambda) -> QueryResult<bool> {
        self.execute_as_async(Terminal::All(predicate.clone())).await
    }

    pub async fn first_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::First(None)).await
    }

    pub async fn first_or_default_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::FirstOrDefault(None)).await
    }

    pub async fn single_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::Single(None)).await
    }

    pub async fn single_or_default_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::SingleOrDefault(None)).await
    }

    pub async fn last_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::Last(None)).await
    }

    pub async fn min_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::Min(None)).await
    }

    pub async fn max_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::Max(None)).await
    }

    pub async fn sum_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::Sum(None)).await
    }

    pub async fn average_async(&self) -> QueryResult<Value> {
        self.execute_as_async(Terminal::Average(None)).await
    }

    pub async fn element_at_async(&self, index: Index) -> QueryResult<Value> {
        self.execute_as_async(Terminal::ElementAt(index)).await
    }

    pub async fn contains_async(&self, value: impl Into<Value>) -> QueryResult<bool> {
        self.execute_as_async(Terminal::Contains(value.into())).await
    }
}
