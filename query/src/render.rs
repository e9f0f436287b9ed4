//! Human-readable rendering of queries.

use crate::aggregates::{fallback, Aggregate};
use crate::node::Query;

impl Query {
    /// Render this query, optionally as the input to an aggregate.
    ///
    /// The backend is asked first. If it has nothing for the aggregate, the
    /// rewrites the primitive executor would run are tried in turn: the
    /// Min/Max fallback, NotAny as Any, First and Any as `take(1)`, Single as
    /// `take(2)`, and Count as the plain query when full scans are allowed.
    /// Without any rendering the backend name is used as a label.
    pub fn render(&self, aggregate: Option<Aggregate>) -> String {
        if let Some(text) = try_render(self, aggregate) {
            return text;
        }
        let name = self.backend().name();
        match aggregate {
            Some(aggregate) => format!("{}:{}", aggregate, name),
            None => name.to_string(),
        }
    }
}

fn try_render(query: &Query, aggregate: Option<Aggregate>) -> Option<String> {
    let backend = query.backend();
    let ask = |query: &Query, aggregate: Option<Aggregate>| {
        backend
            .try_render(query, aggregate)
            .filter(|text| !text.is_empty())
    };
    if let Some(text) = ask(query, aggregate) {
        return Some(text);
    }
    let aggregate = aggregate?;
    if let Ok(Some((rewritten, primitive))) = fallback(query, aggregate) {
        if let Some(text) = try_render(&rewritten, Some(primitive)) {
            return Some(text);
        }
    }
    match aggregate {
        Aggregate::NotAny => ask(query, Some(Aggregate::Any)),
        Aggregate::Any | Aggregate::First | Aggregate::FirstOrDefault => {
            ask(&query.take_rows(1).remove_distinct_if_no_skip(), None)
        }
        Aggregate::Single | Aggregate::SingleOrDefault => ask(&query.take_rows(2), None),
        Aggregate::Count if backend.allows_expensive_aggregates() => ask(query, None),
        _ => None,
    }
}
