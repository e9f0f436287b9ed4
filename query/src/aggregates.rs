//! Aggregate resolution.
//!
//! Terminal operations (count, first, last, element-at, contains, min, ...)
//! are resolved into a rewritten query plus one of a small, fixed set of
//! primitive [`Aggregate`]s. Queries that are known to be empty are answered
//! here without contacting the backend.

use std::fmt;

use sieve_core::{Value, ValueType};
use sieve_expr::{negate, Expr, Lambda};
use tracing::debug;

use crate::node::Query;
use crate::{QueryError, QueryResult};

/// The primitive reductions a backend is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Count,
    Average,
    Minimum,
    Maximum,
    Sum,
    Any,
    NotAny,
}

impl Aggregate {
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::First => "First",
            Aggregate::FirstOrDefault => "FirstOrDefault",
            Aggregate::Single => "Single",
            Aggregate::SingleOrDefault => "SingleOrDefault",
            Aggregate::Count => "Count",
            Aggregate::Average => "Average",
            Aggregate::Minimum => "Minimum",
            Aggregate::Maximum => "Maximum",
            Aggregate::Sum => "Sum",
            Aggregate::Any => "Any",
            Aggregate::NotAny => "NotAny",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A position in a sequence, counted from either end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    FromStart(u64),
    /// `FromEnd(1)` is the last element.
    FromEnd(u64),
}

/// A terminal operation on a query.
#[derive(Debug, Clone)]
pub enum Terminal {
    Count(Option<Lambda>),
    LongCount(Option<Lambda>),
    Any(Option<Lambda>),
    All(Lambda),
    First(Option<Lambda>),
    FirstOrDefault(Option<Lambda>),
    Single(Option<Lambda>),
    SingleOrDefault(Option<Lambda>),
    Last(Option<Lambda>),
    LastOrDefault(Option<Lambda>),
    Average(Option<Lambda>),
    Sum(Option<Lambda>),
    Min(Option<Lambda>),
    Max(Option<Lambda>),
    ElementAt(Index),
    ElementAtOrDefault(Index),
    Contains(Value),
}

/// A terminal operation rewritten for the backend.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub query: Query,
    pub aggregate: Aggregate,
    /// The type the caller receives.
    pub result_type: ValueType,
}

/// The outcome of resolving a terminal operation.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Hand the rewritten query to the backend.
    Execute(Resolved),
    /// The answer is already known.
    Done(Value),
}

/// Resolve a terminal operation against a query.
pub fn resolve(query: &Query, terminal: Terminal) -> QueryResult<Resolution> {
    let resolved = rewrite(query, terminal)?;
    if let Some(outcome) = short_circuit(&resolved.query, resolved.aggregate, &resolved.result_type)
    {
        debug!(aggregate = %resolved.aggregate, "short-circuited empty query");
        return outcome.map(Resolution::Done);
    }
    Ok(Resolution::Execute(resolved))
}

fn rewrite(query: &Query, terminal: Terminal) -> QueryResult<Resolved> {
    let (query, aggregate) = match terminal {
        Terminal::Count(predicate) => {
            return Ok(resolved(filtered(query, predicate)?, Aggregate::Count, ValueType::Int32));
        }
        Terminal::LongCount(predicate) => {
            return Ok(resolved(filtered(query, predicate)?, Aggregate::Count, ValueType::Int64));
        }
        Terminal::Any(predicate) => {
            return Ok(resolved(filtered(query, predicate)?, Aggregate::Any, ValueType::Bool));
        }
        Terminal::All(predicate) => {
            let negated = negate(&predicate).map_err(QueryError::merge_failure)?;
            let query = query.apply_where(&negated)?;
            return Ok(resolved(query, Aggregate::NotAny, ValueType::Bool));
        }
        Terminal::First(predicate) => (filtered(query, predicate)?, Aggregate::First),
        Terminal::FirstOrDefault(predicate) => {
            (filtered(query, predicate)?, Aggregate::FirstOrDefault)
        }
        Terminal::Single(predicate) => (filtered(query, predicate)?, Aggregate::Single),
        Terminal::SingleOrDefault(predicate) => {
            (filtered(query, predicate)?, Aggregate::SingleOrDefault)
        }
        Terminal::Last(predicate) => (
            filtered(query, predicate)?.apply_reverse()?,
            Aggregate::First,
        ),
        Terminal::LastOrDefault(predicate) => (
            filtered(query, predicate)?.apply_reverse()?,
            Aggregate::FirstOrDefault,
        ),
        Terminal::Average(selector) => {
            let query = projected(query, selector)?;
            let element = query.element_type();
            require_numeric(Aggregate::Average, &element)?;
            let result_type = if element == ValueType::Float32 {
                ValueType::Float32
            } else {
                ValueType::Float64
            };
            return Ok(resolved(query, Aggregate::Average, result_type));
        }
        Terminal::Sum(selector) => {
            let query = projected(query, selector)?;
            require_numeric(Aggregate::Sum, &query.element_type())?;
            (query, Aggregate::Sum)
        }
        Terminal::Min(selector) => (projected(query, selector)?, Aggregate::Minimum),
        Terminal::Max(selector) => (projected(query, selector)?, Aggregate::Maximum),
        Terminal::ElementAt(index) => (at_index(query, index)?, Aggregate::First),
        Terminal::ElementAtOrDefault(index) => {
            (at_index(query, index)?, Aggregate::FirstOrDefault)
        }
        Terminal::Contains(value) => {
            let element = query.element_type();
            if !value.is_instance_of(&element) {
                return Err(QueryError::argument_error(
                    "value",
                    format!("{} is not a {}", value.type_name(), element),
                ));
            }
            let predicate = Lambda::build("x", element.clone(), |x| {
                x.equals(Expr::typed_constant(value, element)?)
            })
            .map_err(QueryError::merge_failure)?;
            let query = query.apply_where(&predicate)?;
            return Ok(resolved(query, Aggregate::Any, ValueType::Bool));
        }
    };
    let result_type = query.element_type();
    Ok(resolved(query, aggregate, result_type))
}

fn resolved(query: Query, aggregate: Aggregate, result_type: ValueType) -> Resolved {
    Resolved {
        query,
        aggregate,
        result_type,
    }
}

fn filtered(query: &Query, predicate: Option<Lambda>) -> QueryResult<Query> {
    match predicate {
        Some(predicate) => query.apply_where(&predicate),
        None => Ok(query.clone()),
    }
}

fn projected(query: &Query, selector: Option<Lambda>) -> QueryResult<Query> {
    match selector {
        Some(selector) => query.apply_select(&selector),
        None => Ok(query.clone()),
    }
}

fn at_index(query: &Query, index: Index) -> QueryResult<Query> {
    match index {
        Index::FromStart(n) => Ok(query.skip_rows(n)),
        Index::FromEnd(n) => {
            if !query.is_ordered() {
                return Err(QueryError::invalid_composition(
                    "Indexing from the end requires an explicit order",
                ));
            }
            if n == 0 {
                return Ok(query.take_rows(0));
            }
            Ok(query.apply_reverse()?.skip_rows(n - 1))
        }
    }
}

fn require_numeric(aggregate: Aggregate, element: &ValueType) -> QueryResult<()> {
    if element.is_numeric() {
        Ok(())
    } else {
        Err(QueryError::not_supported(
            aggregate.name(),
            format!("{} is not a numeric type", element),
        ))
    }
}

/// The answer for a query known to produce no rows, or `None` if the
/// backend has to be asked.
pub fn short_circuit(
    query: &Query,
    aggregate: Aggregate,
    result_type: &ValueType,
) -> Option<QueryResult<Value>> {
    if !query.is_empty() {
        return None;
    }
    let outcome = match aggregate {
        Aggregate::Count | Aggregate::Sum => Ok(result_type.zero_value()),
        Aggregate::Any => Ok(Value::Bool(false)),
        Aggregate::NotAny => Ok(Value::Bool(true)),
        Aggregate::FirstOrDefault | Aggregate::SingleOrDefault => Ok(result_type.zero_value()),
        Aggregate::First
        | Aggregate::Single
        | Aggregate::Average
        | Aggregate::Minimum
        | Aggregate::Maximum => Err(QueryError::EmptyResult),
    };
    Some(outcome)
}

/// Rewrite an aggregate the backend may not support into one it does.
///
/// Minimum and Maximum become an order by the projected value (or the
/// element itself for unprojected scalar queries) followed by First.
/// Distinct is dropped first since it cannot change the extreme value.
pub fn fallback(query: &Query, aggregate: Aggregate) -> QueryResult<Option<(Query, Aggregate)>> {
    let ascending = match aggregate {
        Aggregate::Minimum => true,
        Aggregate::Maximum => false,
        _ => return Ok(None),
    };
    if query.projection().is_none() && query.element_type().as_record().is_some() {
        return Ok(None);
    }
    let ordered = query
        .remove_distinct_if_no_skip()
        .order_by_projection(ascending)?;
    debug!(
        aggregate = %aggregate,
        ascending,
        "rewrote extreme value as ordered First"
    );
    Ok(Some((ordered, Aggregate::First)))
}
