//! Sieve Core Types
//!
//! This crate provides the foundational types used throughout Sieve:
//! - Value types (the Value enum with all scalar and composite values)
//! - Static types (ValueType) and record shapes (RecordType, Field)
//! - Zero values and numeric conversions
//! - Common error types

mod error;
mod types;
mod value;

pub use error::*;
pub use types::*;
pub use value::*;
