//! Replication backtest engine.
//!
//! Drives one strategy across a grid of (q, m) configurations: partition the
//! out-of-sample window, select and weight per period, merge weighted returns
//! into a portfolio series, and score it against the benchmark.

use crate::error::{ReplicationError, Result};
use crate::marketcap::CapProvider;
use crate::metadata::{compute_config_hash, generate_experiment_id};
use crate::periods::{PeriodPartition, SplitConfig};
use crate::report::TrackingMetrics;
use crate::strategy::{PeriodContext, Strategy};
use crate::types::{
    AttributeTable, BenchmarkSeries, CombinedTable, GridPoint, PeriodWeights, ReturnsTable,
    TrackingSeries,
};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Configuration for the replication engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// In-sample / out-of-sample split settings.
    pub split: SplitConfig,
    /// Show a progress bar while sweeping the grid.
    pub show_progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            show_progress: true,
        }
    }
}

/// Result of one (q, m) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResult {
    /// Grid configuration.
    pub grid: GridPoint,
    /// Pearson correlation of the portfolio series with the benchmark.
    pub correlation: f64,
    /// Benchmark comparison metrics, when computable.
    pub metrics: Option<TrackingMetrics>,
    /// Weighted holdings actually used, one entry per non-skipped period.
    pub period_weights: Vec<PeriodWeights>,
    /// Periods skipped because the selection came back empty.
    pub skipped_periods: usize,
    /// Realized out-of-sample portfolio return series. Rows belonging to
    /// skipped periods hold NaN.
    pub series: TrackingSeries,
}

/// Results of a full grid sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationResult {
    /// Strategy name.
    pub strategy_name: String,
    /// Strategy parameters as reported by the strategy.
    pub strategy_params: Vec<(String, String)>,
    /// One result per grid point, in sweep order.
    pub runs: Vec<TrackingResult>,
    /// Benchmark column plus one realized-return column per grid point.
    pub combined: CombinedTable,
    /// Wall-clock bounds of the sweep.
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Unique id for this run.
    pub experiment_id: Uuid,
    /// Hash of the engine configuration and grid.
    pub config_hash: String,
}

impl ReplicationResult {
    /// The best run by benchmark correlation, if any run produced one.
    pub fn best_run(&self) -> Option<&TrackingResult> {
        self.runs
            .iter()
            .filter(|r| r.correlation.is_finite())
            .max_by(|a, b| a.correlation.partial_cmp(&b.correlation).unwrap())
    }
}

/// Replication backtest engine.
pub struct ReplicationEngine {
    config: EngineConfig,
    returns: ReturnsTable,
    benchmark: BenchmarkSeries,
    attributes: Option<AttributeTable>,
    caps: Box<dyn CapProvider>,
}

impl ReplicationEngine {
    pub fn new(
        config: EngineConfig,
        returns: ReturnsTable,
        benchmark: BenchmarkSeries,
        caps: Box<dyn CapProvider>,
    ) -> Self {
        Self {
            config,
            returns,
            benchmark,
            attributes: None,
            caps,
        }
    }

    /// Attach the ticker attribute table (required by the attribute strategy).
    pub fn with_attributes(mut self, attributes: AttributeTable) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn returns(&self) -> &ReturnsTable {
        &self.returns
    }

    /// Sweep the grid with the given strategy.
    pub fn run(
        &self,
        strategy: &mut dyn Strategy,
        grid: &[GridPoint],
    ) -> Result<ReplicationResult> {
        if self.returns.is_empty() {
            return Err(ReplicationError::NoData);
        }
        if grid.is_empty() {
            return Err(ReplicationError::ConfigError(
                "Empty (q, m) grid".to_string(),
            ));
        }

        let universe_size = self.returns.n_tickers();
        for gp in grid {
            if gp.q == 0 || gp.q > universe_size {
                return Err(ReplicationError::ConfigError(format!(
                    "q={} is outside the universe of {} tickers",
                    gp.q, universe_size
                )));
            }
        }

        let start_time = Utc::now();
        info!(
            "Running {} over {} grid points ({} tickers, {} rows)",
            strategy.name(),
            grid.len(),
            universe_size,
            self.returns.n_rows()
        );

        // The OOS window only depends on the split, not on m: every grid
        // point shares the same out-of-sample dates.
        let base = PeriodPartition::build(
            self.returns.n_rows(),
            grid.iter().map(|g| g.m).max().unwrap_or(1),
            &self.config.split,
        )?;
        let oos_dates: Vec<DateTime<Utc>> = self.returns.dates()[base.oos_rows()].to_vec();

        if self.benchmark.len() != oos_dates.len() {
            warn!(
                "Benchmark has {} rows but the out-of-sample window has {}; \
                 aligning positionally over the overlap",
                self.benchmark.len(),
                oos_dates.len()
            );
        }

        let mut combined = CombinedTable::with_benchmark(oos_dates.clone(), &self.benchmark);

        let progress = if self.config.show_progress {
            let pb = ProgressBar::new(grid.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut runs = Vec::with_capacity(grid.len());
        for gp in grid {
            if let Some(ref pb) = progress {
                pb.set_message(gp.to_string());
            }

            let run = self.run_grid_point(strategy, *gp)?;
            combined.push_column(gp.label(), run.series.returns.clone());
            runs.push(run);

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Grid sweep complete");
        }

        let config_hash = compute_config_hash(&(&self.config, grid));

        Ok(ReplicationResult {
            strategy_name: strategy.name().to_string(),
            strategy_params: strategy.parameters(),
            runs,
            combined,
            start_time,
            end_time: Utc::now(),
            experiment_id: generate_experiment_id(),
            config_hash,
        })
    }

    /// Run a single (q, m) configuration.
    fn run_grid_point(&self, strategy: &mut dyn Strategy, gp: GridPoint) -> Result<TrackingResult> {
        let partition = PeriodPartition::build(self.returns.n_rows(), gp.m, &self.config.split)?;
        let split_point = partition.split_point;
        let n_oos = partition.n_oos();

        let mut series = vec![f64::NAN; n_oos];
        let mut period_weights = Vec::new();
        let mut skipped = 0usize;

        for period in &partition.periods {
            let ctx = PeriodContext {
                period: period.index,
                q: gp.q,
                table: &self.returns,
                is_rows: partition.in_sample_window(period),
                caps: self.caps.as_ref(),
                attributes: self.attributes.as_ref(),
            };

            let positions = strategy.select(&ctx)?;
            if positions.is_empty() {
                println!(
                    "({},{}) period {}: No tickers selected — skipping.",
                    gp.q, gp.m, period.index
                );
                skipped += 1;
                continue;
            }

            let weights = PeriodWeights::new(period.index, positions);
            let total = weights.total_weight();
            if total > 1.0 + WEIGHT_SUM_TOLERANCE || weights.positions.iter().any(|(_, w)| *w < 0.0)
            {
                warn!(
                    "{} period {}: weights out of bounds (sum {:.6})",
                    gp,
                    period.index,
                    total
                );
            }

            self.apply_period_weights(&weights, period.rows(), split_point, &mut series);
            period_weights.push(weights);
        }

        let bench = &self.benchmark.returns;
        let overlap = series.len().min(bench.len());
        let metrics = TrackingMetrics::calculate(
            &self.benchmark.label,
            &series[..overlap],
            &bench[..overlap],
        );
        let correlation = metrics.as_ref().map(|m| m.correlation).unwrap_or(f64::NAN);

        info!(
            "{}: correlation {:.4} ({} of {} periods used)",
            gp,
            correlation,
            partition.periods.len() - skipped,
            partition.periods.len()
        );

        let oos_dates = self.returns.dates()[partition.oos_rows()].to_vec();
        Ok(TrackingResult {
            grid: gp,
            correlation,
            metrics,
            period_weights,
            skipped_periods: skipped,
            series: TrackingSeries::new(oos_dates, series),
        })
    }

    /// Merge one period's weights with its out-of-sample returns: for each
    /// date in the period, the portfolio return is the weighted sum over the
    /// held tickers. Non-finite ticker returns contribute nothing.
    fn apply_period_weights(
        &self,
        weights: &PeriodWeights,
        rows: std::ops::Range<usize>,
        split_point: usize,
        series: &mut [f64],
    ) {
        let held: Vec<(usize, f64)> = weights
            .positions
            .iter()
            .filter_map(|(t, w)| self.returns.ticker_index(t).map(|i| (i, *w)))
            .collect();

        for row in rows {
            let daily: f64 = held
                .iter()
                .map(|(col, w)| {
                    let r = self.returns.value(row, *col);
                    if r.is_finite() {
                        w * r
                    } else {
                        0.0
                    }
                })
                .sum();
            series[row - split_point] = daily;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketcap::CachedCapProvider;
    use crate::types::CapTable;
    use chrono::TimeZone;

    /// Deterministic strategy holding the first q tickers at equal weight.
    struct FirstQ;

    impl Strategy for FirstQ {
        fn name(&self) -> &str {
            "FirstQ"
        }

        fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
            let w = 1.0 / ctx.q as f64;
            Ok(ctx.universe()[..ctx.q]
                .iter()
                .map(|t| (t.clone(), w))
                .collect())
        }
    }

    /// Strategy that never selects anything.
    struct NeverSelect;

    impl Strategy for NeverSelect {
        fn name(&self) -> &str {
            "NeverSelect"
        }

        fn select(&mut self, _ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
            Ok(vec![])
        }
    }

    fn synthetic_engine(n_rows: usize, n_tickers: usize) -> ReplicationEngine {
        let dates = (0..n_rows)
            .map(|i| {
                Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64)
            })
            .collect::<Vec<_>>();
        let tickers: Vec<String> = (0..n_tickers).map(|i| format!("T{:02}", i)).collect();
        let rows: Vec<Vec<f64>> = (0..n_rows)
            .map(|i| {
                (0..n_tickers)
                    .map(|j| ((i * 7 + j * 3) as f64).sin() * 0.01)
                    .collect()
            })
            .collect();

        let returns = ReturnsTable::new(dates, tickers, rows.clone());

        let split = SplitConfig::default();
        let split_point = (split.in_sample_ratio * n_rows as f64) as usize;
        let bench: Vec<f64> = rows[split_point..]
            .iter()
            .map(|r| r.iter().sum::<f64>() / n_tickers as f64)
            .collect();

        ReplicationEngine::new(
            EngineConfig {
                show_progress: false,
                ..Default::default()
            },
            returns,
            BenchmarkSeries::new("INDEX", bench),
            Box::new(CachedCapProvider::new(CapTable::new())),
        )
    }

    #[test]
    fn test_run_produces_one_column_per_grid_point() {
        let engine = synthetic_engine(200, 6);
        let grid = vec![GridPoint::new(2, 2), GridPoint::new(3, 4)];

        let result = engine.run(&mut FirstQ, &grid).unwrap();

        assert_eq!(result.runs.len(), 2);
        // Benchmark column plus one column per grid point.
        assert_eq!(result.combined.n_columns(), 3);
        assert!(result.combined.column("(2,2)").is_some());
        assert!(result.combined.column("(3,4)").is_some());
        assert_eq!(result.combined.n_rows(), 60);
        assert_eq!(result.config_hash.len(), 64);
    }

    #[test]
    fn test_series_preserves_oos_dates() {
        let engine = synthetic_engine(100, 4);
        let result = engine.run(&mut FirstQ, &[GridPoint::new(2, 3)]).unwrap();

        let run = &result.runs[0];
        assert_eq!(run.series.len(), 30);
        assert_eq!(run.series.dates.first(), engine.returns().dates().get(70));
        assert_eq!(run.series.dates.last(), engine.returns().dates().last());
        assert!(run.series.returns.iter().all(|r| r.is_finite()));
    }

    #[test]
    fn test_equal_weight_portfolio_tracks_average_benchmark() {
        // Holding the whole universe at equal weight reproduces the
        // universe-average benchmark exactly.
        let engine = synthetic_engine(150, 5);
        let result = engine.run(&mut FirstQ, &[GridPoint::new(5, 3)]).unwrap();

        let run = &result.runs[0];
        assert!(run.correlation > 0.9999);
    }

    #[test]
    fn test_empty_selection_skips_all_periods() {
        let engine = synthetic_engine(100, 4);
        let result = engine
            .run(&mut NeverSelect, &[GridPoint::new(2, 3)])
            .unwrap();

        let run = &result.runs[0];
        assert_eq!(run.skipped_periods, 3);
        assert!(run.period_weights.is_empty());
        assert!(run.series.returns.iter().all(|r| r.is_nan()));
        assert!(run.correlation.is_nan());
    }

    #[test]
    fn test_oversized_q_is_a_config_error() {
        let engine = synthetic_engine(100, 4);
        let err = engine.run(&mut FirstQ, &[GridPoint::new(10, 2)]).unwrap_err();
        assert!(matches!(err, ReplicationError::ConfigError(_)));
    }

    #[test]
    fn test_empty_grid_is_a_config_error() {
        let engine = synthetic_engine(100, 4);
        assert!(engine.run(&mut FirstQ, &[]).is_err());
    }
}
