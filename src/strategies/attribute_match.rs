//! Attribute-matching selection: max-corr picks, cap weights, then an LP
//! reallocation that pulls feature exposures toward fixed targets.

use crate::error::{ReplicationError, Result};
use crate::marketcap::cap_weights;
use crate::solver::AmplRunner;
use crate::strategy::{PeriodContext, Strategy};
use std::collections::BTreeMap;
use tracing::debug;

/// Default feature-exposure targets (share of portfolio weight allowed per
/// attribute bucket).
pub fn default_targets() -> BTreeMap<String, f64> {
    [
        ("SmallCap", 0.1),
        ("MidCap", 0.1),
        ("LargeCap", 1.0),
        ("Tech", 0.6),
        ("Finance", 0.8),
        ("Healthcare", 0.3),
        ("Consumer", 0.15),
        ("Utilities", 0.2),
        ("Energy", 0.2),
        ("Industrial", 0.1),
        ("Domestic", 0.99),
        ("International", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Two-stage selection: the correlation MIP chooses q representatives, their
/// cap weights are expanded over the full universe, and the attribute LP
/// reassigns weight so exposures respect the targets.
pub struct AttributeStrategy {
    runner: AmplRunner,
    targets: BTreeMap<String, f64>,
}

impl AttributeStrategy {
    pub fn new(runner: AmplRunner, targets: BTreeMap<String, f64>) -> Self {
        Self { runner, targets }
    }

    /// Targets restricted to features that exist in the attribute table, are
    /// carried by at least one ticker in the universe, and have a configured
    /// target.
    fn available_targets(
        &self,
        attrs: &crate::types::AttributeTable,
        universe: &[String],
    ) -> BTreeMap<String, f64> {
        attrs
            .features()
            .iter()
            .filter(|f| attrs.support(f, universe) > 0)
            .filter_map(|f| self.targets.get(f).map(|t| (f.clone(), *t)))
            .collect()
    }
}

impl Strategy for AttributeStrategy {
    fn name(&self) -> &str {
        "Attribute Match"
    }

    fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
        let attrs = ctx.attributes.ok_or_else(|| {
            ReplicationError::ConfigError(
                "Attribute strategy requires a ticker attribute table".to_string(),
            )
        })?;

        let corr = ctx.correlation();
        let selected = self.runner.solve_selection(&corr, ctx.q)?;
        if selected.is_empty() {
            return Ok(vec![]);
        }

        // Cap-share weights on the selection, zero elsewhere.
        let caps = ctx.caps.caps_for(&selected);
        let seed_weights = cap_weights(&selected, &caps);

        let universe = ctx.universe();
        let mut x_orig = vec![0.0; universe.len()];
        for (ticker, weight) in &seed_weights {
            if let Some(i) = universe.iter().position(|t| t == ticker) {
                x_orig[i] = *weight;
            }
        }

        let targets = self.available_targets(attrs, universe);
        debug!(
            "Period {}: rebalancing over {} features",
            ctx.period,
            targets.len()
        );

        self.runner
            .solve_rebalance(universe, &x_orig, attrs, &targets)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            (
                "solver".to_string(),
                self.runner.config().solver_name.clone(),
            ),
            ("targets".to_string(), self.targets.len().to_string()),
        ]
    }
}
