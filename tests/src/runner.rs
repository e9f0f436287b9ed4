//! Scenario runner.

use sieve_query::Query;
use tracing::{debug, info};

use crate::error::HarnessResult;
use crate::scenario::Scenario;

/// Runs a scenario's steps against its source query.
pub struct Runner<'s> {
    scenario: &'s Scenario,
    source: &'s Query,
}

impl<'s> Runner<'s> {
    /// Create a new runner for a scenario.
    pub fn new(scenario: &'s Scenario) -> HarnessResult<Self> {
        let source = scenario.source_query()?;
        Ok(Self { scenario, source })
    }

    /// Run the scenario, stopping at the first failed assertion.
    pub fn run(&self) -> HarnessResult<()> {
        info!(scenario = %self.scenario.name, source = %self.source, "running scenario");

        for step in self.scenario.steps() {
            let result = (step.run)(self.source);
            match &result {
                Ok(outcome) => debug!(step = %step.name, %outcome, "step finished"),
                Err(e) => debug!(step = %step.name, error = %e, "step failed"),
            }
            step.assertion.verify(&step.name, &result)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{blap, foo_backend};
    use crate::{HarnessError, Scenario};
    use sieve_query::QueryAlgebra;

    #[test]
    fn test_scenario_runs_all_steps() {
        let backend = foo_backend().unwrap();
        let scenario = Scenario::new("foo")
            .source(backend.query())
            .step("first", |q| q.select(&blap()?)?.first(), |a| a.value(0))
            .step("rows", |q| q.to_list(), |a| a.rows(4));

        assert!(scenario.run().is_ok());
    }

    #[test]
    fn test_failed_assertion_names_step() {
        let backend = foo_backend().unwrap();
        let scenario = Scenario::new("foo")
            .source(backend.query())
            .step("any", |q| q.any(), |a| a.value(false));

        let err = scenario.run().unwrap_err();

        assert!(matches!(err, HarnessError::AssertionFailed { ref step, .. } if step == "any"));
    }

    #[test]
    fn test_missing_source() {
        let scenario = Scenario::new("empty");

        assert!(matches!(
            scenario.run(),
            Err(HarnessError::MissingSource { .. })
        ));
    }
}
