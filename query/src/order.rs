//! Order clauses.
//!
//! Orderings are stored as a persistent singly linked list with the most
//! recent clause at the head, so `then_by` is an O(1) prepend that shares
//! the rest of the list with the query it was derived from. Each entry
//! records whether it started a new top-level ordering (`order_by`) or
//! continued the current one (`then_by`).
//!
//! Materialization turns the list back into priority order: the most
//! recently started group is the primary sort, and within each group the
//! clauses keep their call order. A `reversed` flag on the state inverts
//! every clause's direction without rewriting the list.

use std::fmt;
use std::sync::Arc;

use sieve_expr::Lambda;

/// A materialized sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub expr: Lambda,
    pub ascending: bool,
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.ascending { "asc" } else { "desc" };
        write!(f, "{} {}", self.expr, dir)
    }
}

#[derive(Debug)]
struct OrderEntry {
    expr: Lambda,
    ascending: bool,
    new_group: bool,
    next: Option<Arc<OrderEntry>>,
    count: usize,
}

/// The order applied to a query: a clause list plus a reversal flag.
#[derive(Debug, Clone)]
pub struct OrderState {
    head: Arc<OrderEntry>,
    reversed: bool,
}

impl OrderState {
    /// Order by a single clause.
    pub fn new(expr: Lambda, ascending: bool) -> Self {
        Self {
            head: Arc::new(OrderEntry {
                expr,
                ascending,
                new_group: true,
                next: None,
                count: 1,
            }),
            reversed: false,
        }
    }

    /// Add a clause. A reversed state stores the clause with its direction
    /// flipped so that it reads correctly once the reversal is applied.
    pub fn push(&self, expr: Lambda, new_group: bool, ascending: bool) -> Self {
        let ascending = if self.reversed { !ascending } else { ascending };
        Self {
            head: Arc::new(OrderEntry {
                expr,
                ascending,
                new_group,
                next: Some(self.head.clone()),
                count: self.head.count + 1,
            }),
            reversed: self.reversed,
        }
    }

    /// Toggle the reversal flag.
    pub fn reverse(&self) -> Self {
        Self {
            head: self.head.clone(),
            reversed: !self.reversed,
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.head.count
    }

    /// Clauses in priority order, with the reversal flag applied.
    pub fn clauses(&self) -> Vec<OrderClause> {
        let mut out = Vec::with_capacity(self.len());
        let mut group_start = 0;
        let mut entry = Some(&self.head);
        while let Some(node) = entry {
            out.push(OrderClause {
                expr: node.expr.clone(),
                ascending: node.ascending != self.reversed,
            });
            if node.new_group {
                out[group_start..].reverse();
                group_start = out.len();
            }
            entry = node.next.as_ref();
        }
        out[group_start..].reverse();
        out
    }
}
