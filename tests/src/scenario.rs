//! Scenario definition and builder.

use std::fmt;

use sieve_core::Value;
use sieve_query::{Query, QueryResult};

use crate::assertion::{Assertion, AssertionBuilder};
use crate::error::{HarnessError, HarnessResult};
use crate::runner::Runner;

/// What a step produced: materialized rows or a single terminal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(Vec<Value>),
    Scalar(Value),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Scalar(value) => write!(f, "{}", value),
            Outcome::Rows(rows) => write!(f, "{} rows", rows.len()),
        }
    }
}

impl From<Vec<Value>> for Outcome {
    fn from(rows: Vec<Value>) -> Self {
        Outcome::Rows(rows)
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Scalar(value)
    }
}

impl From<i32> for Outcome {
    fn from(n: i32) -> Self {
        Outcome::Scalar(Value::Int32(n))
    }
}

impl From<i64> for Outcome {
    fn from(n: i64) -> Self {
        Outcome::Scalar(Value::Int64(n))
    }
}

impl From<bool> for Outcome {
    fn from(b: bool) -> Self {
        Outcome::Scalar(Value::Bool(b))
    }
}

impl From<f64> for Outcome {
    fn from(x: f64) -> Self {
        Outcome::Scalar(Value::Float64(x))
    }
}

pub type StepFn = Box<dyn Fn(&Query) -> QueryResult<Outcome> + Send + Sync>;

/// A step in a scenario: an action on the source query and its assertion.
pub struct Step {
    pub name: String,
    pub run: StepFn,
    pub assertion: Assertion,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("assertion", &self.assertion)
            .finish()
    }
}

/// A test scenario: a source query and a sequence of steps run against it.
#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    source: Option<Query>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            steps: Vec::new(),
        }
    }

    /// Set the query every step starts from.
    pub fn source(mut self, query: Query) -> Self {
        self.source = Some(query);
        self
    }

    /// Add a step. The step's output is converted to an [`Outcome`].
    pub fn step<R, T, A>(mut self, name: impl Into<String>, run: R, assertion: A) -> Self
    where
        R: Fn(&Query) -> QueryResult<T> + Send + Sync + 'static,
        T: Into<Outcome>,
        A: FnOnce(AssertionBuilder) -> AssertionBuilder,
    {
        let builder = assertion(AssertionBuilder::new());
        self.steps.push(Step {
            name: name.into(),
            run: Box::new(move |query| run(query).map(Into::into)),
            assertion: builder.build(),
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The configured source query.
    pub fn source_query(&self) -> HarnessResult<&Query> {
        self.source
            .as_ref()
            .ok_or_else(|| HarnessError::missing_source(&self.name))
    }

    /// Run every step and verify its assertion.
    pub fn run(&self) -> HarnessResult<()> {
        Runner::new(self)?.run()
    }
}
