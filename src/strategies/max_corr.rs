//! Correlation-maximizing selection via the external MIP.

use crate::error::Result;
use crate::marketcap::cap_weights;
use crate::solver::AmplRunner;
use crate::strategy::{PeriodContext, Strategy};
use tracing::debug;

/// Selects the q tickers that best represent the universe by solving the
/// correlation-maximization MIP on the in-sample window, then weights the
/// selection by market-cap share.
pub struct MaxCorrStrategy {
    runner: AmplRunner,
}

impl MaxCorrStrategy {
    pub fn new(runner: AmplRunner) -> Self {
        Self { runner }
    }
}

impl Strategy for MaxCorrStrategy {
    fn name(&self) -> &str {
        "Max Correlation"
    }

    fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
        let corr = ctx.correlation();
        let selected = self.runner.solve_selection(&corr, ctx.q)?;
        debug!(
            "Period {}: solver picked {} of {} tickers",
            ctx.period,
            selected.len(),
            ctx.universe().len()
        );

        if selected.is_empty() {
            return Ok(vec![]);
        }

        let caps = ctx.caps.caps_for(&selected);
        Ok(cap_weights(&selected, &caps))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![(
            "solver".to_string(),
            self.runner.config().solver_name.clone(),
        )]
    }
}
