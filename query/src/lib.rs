//! Sieve Query
//!
//! A backend-agnostic query algebra.
//!
//! Responsibilities:
//! - Compose immutable queries (filter, project, order, skip/take, distinct)
//!   and reject illegal operation orders at composition time
//! - Resolve terminal operations into primitive aggregates, with fallback
//!   rewrites and short-circuits for provably empty queries
//! - Define the execution boundary a backend implements, and execute the
//!   primitive aggregates over it, blocking or async

mod aggregates;
mod algebra;
mod boundary;
mod decorate;
mod error;
mod executor;
mod extract;
mod node;
mod order;
mod render;
mod terms;

pub use aggregates::{fallback, resolve, short_circuit, Aggregate, Index, Resolution, Resolved, Terminal};
pub use algebra::QueryAlgebra;
pub use boundary::{Backend, BackendState, NullBackend, RowIter, RowStream, ValueReader};
pub use decorate::{AsyncQuery, Decorated};
pub use error::{QueryError, QueryResult};
pub use executor::{execute_primitive, execute_primitive_async};
pub use extract::FromValue;
pub use node::Query;
pub use order::{OrderClause, OrderState};
pub use terms::QueryTerms;
