//! Parameter bindings for evaluation.

use std::collections::HashMap;

use sieve_core::Value;

use crate::Parameter;

/// Values bound to lambda parameters, keyed by parameter identity.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: HashMap<u64, Value>,
}

impl Bindings {
    /// Create new empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings with a single parameter bound.
    pub fn single(param: &Parameter, value: Value) -> Self {
        let mut bindings = Self::new();
        bindings.insert(param, value);
        bindings
    }

    /// Bind a value to a parameter, replacing any previous binding.
    pub fn insert(&mut self, param: &Parameter, value: Value) {
        self.map.insert(param.id(), value);
    }

    /// Get the value bound to a parameter.
    pub fn get(&self, param: &Parameter) -> Option<&Value> {
        self.map.get(&param.id())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
