//! Selection strategy trait and per-period context.

use crate::error::Result;
use crate::marketcap::CapProvider;
use crate::stats::{correlation_matrix, CorrMatrix};
use crate::types::{AttributeTable, ReturnsTable};
use std::ops::Range;

/// Context provided to a strategy for one rebalancing period.
pub struct PeriodContext<'a> {
    /// 1-based period index.
    pub period: usize,
    /// Number of tickers to select.
    pub q: usize,
    /// Full return history.
    pub table: &'a ReturnsTable,
    /// In-sample row range for this period.
    pub is_rows: Range<usize>,
    /// Market capitalization source.
    pub caps: &'a dyn CapProvider,
    /// Ticker attribute matrix, when loaded.
    pub attributes: Option<&'a AttributeTable>,
}

impl<'a> PeriodContext<'a> {
    /// The fixed ticker universe.
    pub fn universe(&self) -> &'a [String] {
        self.table.tickers()
    }

    /// Pairwise correlation matrix over this period's in-sample window.
    pub fn correlation(&self) -> CorrMatrix {
        correlation_matrix(self.table, self.is_rows.clone())
    }
}

/// Trait that all selection strategies implement.
///
/// A strategy turns one period's context into weighted holdings. An empty
/// result means the period is skipped by the engine.
pub trait Strategy {
    /// Returns the name of the strategy.
    fn name(&self) -> &str;

    /// Select tickers and weights for one rebalancing period.
    fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>>;

    /// Strategy parameters as key-value pairs for logging.
    fn parameters(&self) -> Vec<(String, String)> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketcap::CachedCapProvider;
    use crate::types::CapTable;
    use chrono::{TimeZone, Utc};

    struct FixedStrategy;

    impl Strategy for FixedStrategy {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
            Ok(vec![(ctx.universe()[0].clone(), 1.0)])
        }
    }

    fn test_table() -> ReturnsTable {
        let dates = (0..6)
            .map(|i| {
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64)
            })
            .collect();
        ReturnsTable::new(
            dates,
            vec!["A".into(), "B".into()],
            vec![
                vec![0.01, 0.02],
                vec![-0.01, 0.01],
                vec![0.02, -0.01],
                vec![0.005, 0.0],
                vec![0.0, 0.01],
                vec![0.01, -0.02],
            ],
        )
    }

    #[test]
    fn test_context_exposes_universe_and_correlation() {
        let table = test_table();
        let caps = CachedCapProvider::new(CapTable::new());
        let ctx = PeriodContext {
            period: 1,
            q: 1,
            table: &table,
            is_rows: 0..4,
            caps: &caps,
            attributes: None,
        };

        assert_eq!(ctx.universe().len(), 2);
        let corr = ctx.correlation();
        assert_eq!(corr.n(), 2);
        assert!((corr.value(0, 0) - 1.0).abs() < 1e-12);

        let mut strategy = FixedStrategy;
        let positions = strategy.select(&ctx).unwrap();
        assert_eq!(positions, vec![("A".to_string(), 1.0)]);
    }
}
