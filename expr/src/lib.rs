//! Sieve Expressions
//!
//! This crate provides the expression language used for query predicates
//! and projections:
//! - A closed, typed expression tree (constant, parameter, member access,
//!   unary, binary, conditional, call, construct) and single-parameter lambdas
//! - Evaluation against parameter bindings
//! - Partial evaluation (constant folding) and operator re-association
//! - Lambda composition (merge), predicate conjunction and negation

mod ast;
mod binding;
mod error;
mod eval;
mod fold;
mod merge;

pub use ast::*;
pub use binding::*;
pub use error::*;
pub use eval::Evaluator;
pub use fold::{combine_operators, fold, fold_lambda};
pub use merge::{conjoin, is_identity, merge, negate, negate_expr, rebind};
