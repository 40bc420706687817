//! Tracking analytics and terminal reporting.

use crate::engine::{ReplicationResult, TrackingResult};
use crate::stats::pearson;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style};

/// Benchmark comparison metrics for one tracking portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// Benchmark name (e.g., "SP100").
    pub benchmark_name: String,
    /// Correlation coefficient with the benchmark (-1 to 1).
    pub correlation: f64,
    /// Portfolio beta - sensitivity to benchmark movements.
    pub beta: f64,
    /// Tracking error - annualized standard deviation of excess returns, in
    /// percent.
    pub tracking_error: f64,
    /// Benchmark total return for the period, in percent.
    pub benchmark_return_pct: f64,
    /// Portfolio total return for the period, in percent.
    pub portfolio_return_pct: f64,
    /// Excess return (portfolio - benchmark), in percent.
    pub excess_return_pct: f64,
}

impl TrackingMetrics {
    /// Calculate comparison metrics from positionally aligned return series.
    ///
    /// Rows where either side is non-finite (skipped periods, benchmark
    /// padding) are dropped pairwise. Returns None when fewer than two usable
    /// observations remain.
    pub fn calculate(
        benchmark_name: impl Into<String>,
        portfolio_returns: &[f64],
        benchmark_returns: &[f64],
    ) -> Option<Self> {
        let pairs: Vec<(f64, f64)> = portfolio_returns
            .iter()
            .zip(benchmark_returns.iter())
            .filter(|(p, b)| p.is_finite() && b.is_finite())
            .map(|(p, b)| (*p, *b))
            .collect();

        if pairs.len() < 2 {
            return None;
        }

        let n = pairs.len() as f64;
        let port: Vec<f64> = pairs.iter().map(|(p, _)| *p).collect();
        let bench: Vec<f64> = pairs.iter().map(|(_, b)| *b).collect();

        let port_mean: f64 = port.iter().sum::<f64>() / n;
        let bench_mean: f64 = bench.iter().sum::<f64>() / n;

        let covariance: f64 = pairs
            .iter()
            .map(|(p, b)| (p - port_mean) * (b - bench_mean))
            .sum::<f64>()
            / n;
        let bench_variance: f64 =
            bench.iter().map(|b| (b - bench_mean).powi(2)).sum::<f64>() / n;

        let beta = if bench_variance > 0.0 {
            covariance / bench_variance
        } else {
            0.0
        };

        let excess: Vec<f64> = pairs.iter().map(|(p, b)| p - b).collect();
        let excess_mean: f64 = excess.iter().sum::<f64>() / n;
        let tracking_error_daily: f64 = (excess
            .iter()
            .map(|e| (e - excess_mean).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();
        let tracking_error = tracking_error_daily * 252.0_f64.sqrt() * 100.0;

        let portfolio_total: f64 = port.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        let benchmark_total: f64 = bench.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;

        Some(Self {
            benchmark_name: benchmark_name.into(),
            correlation: pearson(&port, &bench),
            beta,
            tracking_error,
            benchmark_return_pct: benchmark_total * 100.0,
            portfolio_return_pct: portfolio_total * 100.0,
            excess_return_pct: (portfolio_total - benchmark_total) * 100.0,
        })
    }
}

/// Formats replication results for the terminal.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print a report of the full grid sweep to stdout.
    pub fn print_report(result: &ReplicationResult) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", " REPLICATION RESULTS ".bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        println!("{}", "Overview".bold().underline());
        println!("  Strategy:        {}", result.strategy_name);
        for (key, value) in &result.strategy_params {
            println!("  {:<16} {}", format!("{}:", key), value);
        }
        println!("  Grid points:     {}", result.runs.len());
        println!(
            "  Period:          {} to {}",
            result.start_time.format("%Y-%m-%d %H:%M:%S"),
            result.end_time.format("%Y-%m-%d %H:%M:%S")
        );
        println!("  Experiment:      {}", result.experiment_id);
        println!();

        Self::print_table(&result.runs);

        if let Some(best) = result.best_run() {
            println!();
            println!(
                "  Best configuration: {} with correlation {}",
                best.grid.label().bold(),
                Self::format_correlation(best.correlation)
            );
        }

        println!();
        println!("{}", "═".repeat(60).blue());
    }

    /// Print per-configuration results as a table, best correlation first.
    pub fn print_table(runs: &[TrackingResult]) {
        let mut sorted: Vec<&TrackingResult> = runs.iter().collect();
        sorted.sort_by(|a, b| {
            b.correlation
                .partial_cmp(&a.correlation)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut builder = Builder::new();
        builder.push_record([
            "Config", "Correlation", "Beta", "TE %", "Excess %", "Skipped",
        ]);

        for run in sorted {
            let (beta, te, excess) = match &run.metrics {
                Some(m) => (
                    format!("{:.2}", m.beta),
                    format!("{:.2}", m.tracking_error),
                    format!("{:.2}", m.excess_return_pct),
                ),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            builder.push_record([
                run.grid.label(),
                format!("{:.4}", run.correlation),
                beta,
                te,
                excess,
                run.skipped_periods.to_string(),
            ]);
        }

        let table = builder.build().with(Style::rounded()).to_string();
        println!("{}", table);
    }

    /// Correlation colored by tracking quality.
    fn format_correlation(corr: f64) -> String {
        let text = format!("{:.4}", corr);
        if corr >= 0.95 {
            text.green().to_string()
        } else if corr >= 0.8 {
            text.yellow().to_string()
        } else {
            text.red().to_string()
        }
    }

    /// Export a result to pretty JSON.
    pub fn to_json(result: &ReplicationResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    /// One CSV line per run: q, m, correlation, tracking error, excess.
    pub fn to_csv(result: &ReplicationResult) -> String {
        let mut out = String::from("q,m,correlation,tracking_error_pct,excess_return_pct\n");
        for run in &result.runs {
            let (te, excess) = match &run.metrics {
                Some(m) => (
                    format!("{:.6}", m.tracking_error),
                    format!("{:.6}", m.excess_return_pct),
                ),
                None => (String::new(), String::new()),
            };
            out.push_str(&format!(
                "{},{},{:.6},{},{}\n",
                run.grid.q, run.grid.m, run.correlation, te, excess
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_on_identical_series() {
        let returns = [0.01, -0.005, 0.02, 0.0, 0.003];
        let m = TrackingMetrics::calculate("SP100", &returns, &returns).unwrap();

        assert!((m.correlation - 1.0).abs() < 1e-9);
        assert!((m.beta - 1.0).abs() < 1e-9);
        assert!(m.tracking_error.abs() < 1e-9);
        assert!(m.excess_return_pct.abs() < 1e-9);
    }

    #[test]
    fn test_metrics_drop_nan_rows() {
        let portfolio = [0.01, f64::NAN, 0.02, -0.01];
        let benchmark = [0.01, 0.5, 0.02, -0.01];
        let m = TrackingMetrics::calculate("SP100", &portfolio, &benchmark).unwrap();
        // With the NaN row gone the series are identical.
        assert!((m.correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_need_two_observations() {
        assert!(TrackingMetrics::calculate("SP100", &[0.01], &[0.01]).is_none());
        let all_nan = [f64::NAN, f64::NAN];
        assert!(TrackingMetrics::calculate("SP100", &all_nan, &[0.01, 0.02]).is_none());
    }

    #[test]
    fn test_excess_return_sign() {
        let portfolio = [0.02, 0.02, 0.02];
        let benchmark = [0.01, 0.01, 0.01];
        let m = TrackingMetrics::calculate("SP100", &portfolio, &benchmark).unwrap();
        assert!(m.excess_return_pct > 0.0);
        assert!(m.benchmark_return_pct > 0.0);
        assert!(m.portfolio_return_pct > m.benchmark_return_pct);
    }
}
