//! The query node model.
//!
//! A [`Query`] is an immutable, shareable description of a sequence query.
//! Every algebra operation returns a new query, or the same query (same
//! allocation, see [`Query::same_as`]) when the operation changes nothing.
//!
//! Nodes come in two shapes:
//! - a source node holding everything that runs over the origin type:
//!   predicate, order clauses, skip and take
//! - a projected node wrapping a source node with a single projection and
//!   the distinct flag
//!
//! Operations on a projected node are rewritten onto its tail by merging
//! them with the projection, so the tail always speaks the origin type and
//! a chain never holds more than one projection.

use std::fmt;
use std::sync::Arc;

use sieve_core::{Value, ValueType};
use sieve_expr::{conjoin, fold_lambda, is_identity, merge, Lambda};
use tracing::debug;

use crate::boundary::{Backend, BackendState};
use crate::order::{OrderClause, OrderState};
use crate::terms::QueryTerms;
use crate::{QueryError, QueryResult};

const WHERE_AFTER_RANGE: &str =
    "Filters ('Where') cannot be added after row limits ('Skip'/'Take') have been applied";
const ORDER_AFTER_RANGE: &str =
    "Ordering cannot be applied after row limits ('Skip'/'Take') have been applied";
const REVERSE_AFTER_RANGE: &str =
    "Reverse cannot be applied after row limits ('Skip'/'Take') have been applied";
const REVERSE_WITHOUT_ORDER: &str =
    "Reverse cannot be applied unless an explicit order has been applied";

/// An immutable query.
#[derive(Clone)]
pub struct Query {
    node: Arc<QueryNode>,
}

enum QueryNode {
    Source(SourceNode),
    Projected(ProjectedNode),
}

#[derive(Clone)]
struct SourceNode {
    backend: Arc<dyn Backend>,
    state: Option<BackendState>,
    origin: ValueType,
    predicate: Option<Lambda>,
    skip: u64,
    take: Option<u64>,
    order: Option<OrderState>,
}

impl SourceNode {
    fn has_range(&self) -> bool {
        self.skip > 0 || self.take.is_some()
    }

    fn is_empty(&self) -> bool {
        self.take == Some(0)
    }
}

#[derive(Clone)]
struct ProjectedNode {
    tail: Query,
    projection: Lambda,
    distinct: bool,
}

impl Query {
    /// A query over every element of `origin` produced by `backend`.
    pub fn new(backend: Arc<dyn Backend>, origin: ValueType) -> Self {
        Self::from_node(QueryNode::Source(SourceNode {
            backend,
            state: None,
            origin,
            predicate: None,
            skip: 0,
            take: None,
            order: None,
        }))
    }

    /// A query carrying backend-owned state.
    pub fn with_state(backend: Arc<dyn Backend>, origin: ValueType, state: BackendState) -> Self {
        Self::new(backend, origin).with_backend_state(state)
    }

    fn from_node(node: QueryNode) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    fn from_source(source: SourceNode) -> Self {
        Self::from_node(QueryNode::Source(source))
    }

    fn source(&self) -> &SourceNode {
        let mut query = self;
        loop {
            match query.node.as_ref() {
                QueryNode::Source(source) => return source,
                QueryNode::Projected(projected) => query = &projected.tail,
            }
        }
    }

    /// True if both handles refer to the same node.
    pub fn same_as(&self, other: &Query) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// The element type before projection.
    pub fn origin_type(&self) -> &ValueType {
        &self.source().origin
    }

    /// The element type produced by the query.
    pub fn element_type(&self) -> ValueType {
        match self.node.as_ref() {
            QueryNode::Source(source) => source.origin.clone(),
            QueryNode::Projected(projected) => projected.projection.return_type(),
        }
    }

    /// The accumulated filter over the origin type.
    pub fn predicate(&self) -> Option<&Lambda> {
        self.source().predicate.as_ref()
    }

    /// The projection from the origin type to the element type.
    pub fn projection(&self) -> Option<&Lambda> {
        match self.node.as_ref() {
            QueryNode::Source(_) => None,
            QueryNode::Projected(projected) => Some(&projected.projection),
        }
    }

    pub fn offset(&self) -> u64 {
        self.source().skip
    }

    /// The row limit; `None` is unbounded.
    pub fn limit(&self) -> Option<u64> {
        self.source().take
    }

    pub fn is_distinct(&self) -> bool {
        match self.node.as_ref() {
            QueryNode::Source(_) => false,
            QueryNode::Projected(projected) => projected.distinct,
        }
    }

    /// True if the query is known to produce no rows.
    pub fn is_empty(&self) -> bool {
        self.source().is_empty()
    }

    pub fn is_ordered(&self) -> bool {
        self.source().order.is_some()
    }

    pub fn is_reversed(&self) -> bool {
        self.source()
            .order
            .as_ref()
            .map(OrderState::is_reversed)
            .unwrap_or(false)
    }

    pub fn order_count(&self) -> usize {
        self.source().order.as_ref().map(OrderState::len).unwrap_or(0)
    }

    /// Order clauses over the origin type, primary clause first.
    pub fn order_clauses(&self) -> Vec<OrderClause> {
        self.source()
            .order
            .as_ref()
            .map(OrderState::clauses)
            .unwrap_or_default()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.source().backend
    }

    pub fn backend_state(&self) -> Option<&BackendState> {
        self.source().state.as_ref()
    }

    /// The same query with different backend state.
    pub fn with_backend_state(&self, state: BackendState) -> Query {
        match self.node.as_ref() {
            QueryNode::Source(source) => Self::from_source(SourceNode {
                state: Some(state),
                ..source.clone()
            }),
            QueryNode::Projected(projected) => {
                self.wrap(projected.tail.with_backend_state(state))
            }
        }
    }

    /// The operations currently active on this query.
    pub fn active_terms(&self) -> QueryTerms {
        let source = self.source();
        let mut terms = QueryTerms::NONE;
        if source.skip > 0 {
            terms |= QueryTerms::SKIP;
        }
        if source.take.is_some() {
            terms |= QueryTerms::TAKE;
        }
        if source.predicate.is_some() {
            terms |= QueryTerms::WHERE;
        }
        if source.order.is_some() {
            terms |= QueryTerms::ORDER_BY;
        }
        if let QueryNode::Projected(projected) = self.node.as_ref() {
            terms |= QueryTerms::SELECT;
            if projected.distinct {
                terms |= QueryTerms::DISTINCT;
            }
        }
        terms
    }

    /// True if any of `terms` is active.
    pub fn has_any(&self, terms: QueryTerms) -> bool {
        self.active_terms().intersects(terms)
    }

    /// True if no term outside `terms` is active.
    pub fn has_at_most(&self, terms: QueryTerms) -> bool {
        terms.contains(self.active_terms())
    }

    /// Filter the query.
    pub fn apply_where(&self, predicate: &Lambda) -> QueryResult<Query> {
        let element = self.element_type();
        check_parameter("predicate", predicate, &element)?;
        if predicate.return_type() != ValueType::Bool {
            return Err(QueryError::argument_error(
                "predicate",
                format!("expected a Bool result, found {}", predicate.return_type()),
            ));
        }
        match self.node.as_ref() {
            QueryNode::Source(source) => self.where_on_source(source, predicate),
            QueryNode::Projected(projected) => {
                let merged = merge(&projected.projection, predicate)
                    .map_err(QueryError::merge_failure)?;
                Ok(self.wrap(projected.tail.apply_where(&merged)?))
            }
        }
    }

    fn where_on_source(&self, source: &SourceNode, predicate: &Lambda) -> QueryResult<Query> {
        if source.is_empty() {
            return Ok(self.clone());
        }
        let predicate = fold_lambda(predicate);
        if matches!(predicate.body().as_constant(), Some(Value::Bool(true))) {
            return Ok(self.clone());
        }
        if source.has_range() {
            return Err(QueryError::invalid_composition(WHERE_AFTER_RANGE));
        }
        let predicate = match &source.predicate {
            Some(existing) => conjoin(existing, &predicate).map_err(QueryError::merge_failure)?,
            None => predicate,
        };
        Ok(Self::from_source(SourceNode {
            predicate: Some(predicate),
            ..source.clone()
        }))
    }

    /// Skip the first `n` rows.
    pub fn apply_skip(&self, n: i64) -> QueryResult<Query> {
        let n = non_negative("skip", n)?;
        Ok(self.skip_rows(n))
    }

    /// Keep at most `n` rows.
    pub fn apply_take(&self, n: i64) -> QueryResult<Query> {
        let n = non_negative("take", n)?;
        Ok(self.take_rows(n))
    }

    pub(crate) fn skip_rows(&self, n: u64) -> Query {
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                if n == 0 || source.is_empty() {
                    return self.clone();
                }
                Self::from_source(SourceNode {
                    skip: source.skip.saturating_add(n),
                    take: source.take.map(|t| t.saturating_sub(n)),
                    ..source.clone()
                })
            }
            QueryNode::Projected(projected) => self.wrap(projected.tail.skip_rows(n)),
        }
    }

    pub(crate) fn take_rows(&self, n: u64) -> Query {
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                if matches!(source.take, Some(t) if t <= n) {
                    return self.clone();
                }
                Self::from_source(SourceNode {
                    take: Some(n),
                    ..source.clone()
                })
            }
            QueryNode::Projected(projected) => self.wrap(projected.tail.take_rows(n)),
        }
    }

    /// Order by `key`. `new_group` starts a new primary ordering (`order_by`);
    /// otherwise the key refines the current one (`then_by`).
    pub fn apply_order_by(
        &self,
        key: &Lambda,
        new_group: bool,
        ascending: bool,
    ) -> QueryResult<Query> {
        check_parameter("key", key, &self.element_type())?;
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                if source.is_empty() {
                    return Ok(self.clone());
                }
                if source.has_range() {
                    return Err(QueryError::invalid_composition(ORDER_AFTER_RANGE));
                }
                let key = fold_lambda(key);
                let order = match &source.order {
                    Some(order) => order.push(key, new_group, ascending),
                    None => OrderState::new(key, ascending),
                };
                Ok(Self::from_source(SourceNode {
                    order: Some(order),
                    ..source.clone()
                }))
            }
            QueryNode::Projected(projected) => {
                let merged =
                    merge(&projected.projection, key).map_err(QueryError::merge_failure)?;
                Ok(self.wrap(projected.tail.apply_order_by(&merged, new_group, ascending)?))
            }
        }
    }

    /// Reverse the current order.
    pub fn apply_reverse(&self) -> QueryResult<Query> {
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                if source.is_empty() {
                    return Ok(self.clone());
                }
                if source.has_range() {
                    return Err(QueryError::invalid_composition(REVERSE_AFTER_RANGE));
                }
                let order = source
                    .order
                    .as_ref()
                    .ok_or_else(|| QueryError::invalid_composition(REVERSE_WITHOUT_ORDER))?;
                Ok(Self::from_source(SourceNode {
                    order: Some(order.reverse()),
                    ..source.clone()
                }))
            }
            QueryNode::Projected(projected) => Ok(self.wrap(projected.tail.apply_reverse()?)),
        }
    }

    /// Project each element. A second projection is composed with the
    /// first rather than stacked on top of it.
    pub fn apply_select(&self, projection: &Lambda) -> QueryResult<Query> {
        check_parameter("projection", projection, &self.element_type())?;
        if is_identity(projection) {
            return Ok(self.clone());
        }
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                if source.is_empty() {
                    if projection.return_type() == source.origin {
                        return Ok(self.clone());
                    }
                } else if source.has_range() {
                    return Err(QueryError::not_supported(
                        "Select",
                        "Projections cannot be constructed from queries with skip/take applied",
                    ));
                }
                Ok(Self::from_node(QueryNode::Projected(ProjectedNode {
                    tail: self.clone(),
                    projection: fold_lambda(projection),
                    distinct: false,
                })))
            }
            QueryNode::Projected(projected) => {
                if projected.distinct {
                    return Err(QueryError::not_supported(
                        "Select",
                        "Additional projections cannot be added after distinct",
                    ));
                }
                let merged =
                    merge(&projected.projection, projection).map_err(QueryError::merge_failure)?;
                debug!(projection = %merged, "merged projection");
                projected.tail.apply_select(&merged)
            }
        }
    }

    /// Enable or disable distinct results.
    pub fn apply_distinct(&self, distinct: bool) -> QueryResult<Query> {
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                if !distinct || source.is_empty() {
                    return Ok(self.clone());
                }
                Err(QueryError::not_supported(
                    "Distinct",
                    "Distinct can only be applied to a projection ('Select')",
                ))
            }
            QueryNode::Projected(projected) => {
                let source = projected.tail.source();
                if projected.distinct == distinct || source.is_empty() {
                    return Ok(self.clone());
                }
                if distinct && source.has_range() {
                    return Err(QueryError::not_supported(
                        "Distinct",
                        "Distinct cannot be applied after Skip/Take operations",
                    ));
                }
                Ok(Self::from_node(QueryNode::Projected(ProjectedNode {
                    distinct,
                    ..projected.clone()
                })))
            }
        }
    }

    /// Order by the projection itself. Used to rewrite Min/Max into a
    /// sorted First.
    pub(crate) fn order_by_projection(&self, ascending: bool) -> QueryResult<Query> {
        match self.node.as_ref() {
            QueryNode::Source(source) => {
                self.apply_order_by(&Lambda::identity(source.origin.clone()), true, ascending)
            }
            QueryNode::Projected(projected) => Ok(self.wrap(projected.tail.apply_order_by(
                &projected.projection,
                true,
                ascending,
            )?)),
        }
    }

    /// Drop the distinct flag when nothing is skipped. The first row of a
    /// distinct sequence is the first row of the underlying sequence, so
    /// First and Any can ignore it.
    pub(crate) fn remove_distinct_if_no_skip(&self) -> Query {
        match self.node.as_ref() {
            QueryNode::Projected(projected) if projected.distinct && self.offset() == 0 => {
                Self::from_node(QueryNode::Projected(ProjectedNode {
                    distinct: false,
                    ..projected.clone()
                }))
            }
            _ => self.clone(),
        }
    }

    /// Re-wrap a new tail in this node's projection, or return this node if
    /// the tail did not change.
    fn wrap(&self, tail: Query) -> Query {
        match self.node.as_ref() {
            QueryNode::Projected(projected) if !projected.tail.same_as(&tail) => {
                Self::from_node(QueryNode::Projected(ProjectedNode {
                    tail,
                    ..projected.clone()
                }))
            }
            _ => self.clone(),
        }
    }
}

fn check_parameter(name: &str, lambda: &Lambda, expected: &ValueType) -> QueryResult<()> {
    if lambda.param_type() != expected {
        return Err(QueryError::argument_error(
            name,
            format!(
                "expected a parameter of type {}, found {}",
                expected,
                lambda.param_type()
            ),
        ));
    }
    Ok(())
}

fn non_negative(name: &str, n: i64) -> QueryResult<u64> {
    u64::try_from(n)
        .map_err(|_| QueryError::argument_error(name, format!("must not be negative, was {}", n)))
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.source();
        f.debug_struct("Query")
            .field("backend", &source.backend.name())
            .field("origin", &source.origin)
            .field("predicate", &source.predicate)
            .field("projection", &self.projection())
            .field("distinct", &self.is_distinct())
            .field("skip", &source.skip)
            .field("take", &source.take)
            .field("order", &self.order_clauses())
            .finish()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(None))
    }
}
