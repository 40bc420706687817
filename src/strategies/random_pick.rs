//! Random-selection baseline.

use crate::error::{ReplicationError, Result};
use crate::marketcap::cap_weights_or_equal;
use crate::strategy::{PeriodContext, Strategy};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

/// Uniformly samples q tickers per period, weighted by market-cap share with
/// an equal-weight fallback. Serves as the baseline the optimized strategies
/// are compared against.
pub struct RandomStrategy {
    rng: StdRng,
    seed: u64,
}

impl RandomStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }
}

impl Strategy for RandomStrategy {
    fn name(&self) -> &str {
        "Random"
    }

    fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
        let universe = ctx.universe();
        if ctx.q > universe.len() {
            return Err(ReplicationError::InvalidInput(format!(
                "Cannot sample {} tickers from a universe of {}",
                ctx.q,
                universe.len()
            )));
        }

        let selected: Vec<String> = sample(&mut self.rng, universe.len(), ctx.q)
            .into_iter()
            .map(|i| universe[i].clone())
            .collect();

        let caps = ctx.caps.caps_for(&selected);
        Ok(cap_weights_or_equal(&selected, &caps))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("seed".to_string(), self.seed.to_string())]
    }
}
