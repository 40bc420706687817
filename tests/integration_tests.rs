//! Integration tests for the replication toolkit.

use mimic::config::ReplicationFileConfig;
use mimic::data::{load_attributes, load_benchmark, load_caps, load_returns, DataConfig};
use mimic::engine::{EngineConfig, ReplicationEngine};
use mimic::error::Result;
use mimic::export::{export_combined_csv, export_correlations_csv, ExportConfig};
use mimic::marketcap::{cap_weights, CachedCapProvider, CapProvider};
use mimic::periods::SplitConfig;
use mimic::strategies::RandomStrategy;
use mimic::strategy::{PeriodContext, Strategy};
use mimic::types::GridPoint;
use std::fmt::Write as _;
use std::path::PathBuf;
use tempfile::TempDir;

/// Number of synthetic trading days used across the fixtures.
const DAYS: usize = 250;

const TICKERS: [&str; 8] = ["AAPL", "MSFT", "JPM", "XOM", "JNJ", "PG", "NEE", "CAT"];

/// Deterministic pseudo-return for (day, ticker): a few overlapping cycles so
/// tickers are partially correlated, the way real sector returns are.
fn synthetic_return(day: usize, ticker: usize) -> f64 {
    let market = ((day as f64) * 0.7).sin() * 0.01;
    let sector = ((day + ticker * 3) as f64 * 1.3).cos() * 0.005;
    let idio = ((day * 7 + ticker * 13) as f64).sin() * 0.002;
    market + sector + idio
}

/// Write the returns, benchmark, caps, and attribute fixtures to a temp dir.
fn write_fixtures(dir: &TempDir) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    let mut returns_csv = String::from("Date,");
    returns_csv.push_str(&TICKERS.join(","));
    returns_csv.push('\n');

    let mut benchmark_csv = String::from("Date,Portfolio_Return\n");

    let split_point = (0.7 * DAYS as f64) as usize;

    let base = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    for day in 0..DAYS {
        let date = (base + chrono::Duration::days(day as i64)).format("%Y-%m-%d");

        let _ = write!(returns_csv, "{}", date);
        let mut row_sum = 0.0;
        for (j, _) in TICKERS.iter().enumerate() {
            let r = synthetic_return(day, j);
            row_sum += r;
            let _ = write!(returns_csv, ",{:.6}", r);
        }
        returns_csv.push('\n');

        // Benchmark file covers only the out-of-sample window, like the
        // reference index extract the study compares against.
        if day >= split_point {
            let _ = writeln!(
                benchmark_csv,
                "{},{:.6}",
                date,
                row_sum / TICKERS.len() as f64
            );
        }
    }

    let mut caps_csv = String::from("Ticker,MarketCap\n");
    for (j, ticker) in TICKERS.iter().enumerate() {
        let _ = writeln!(caps_csv, "{},{}", ticker, (j as u64 + 1) * 100_000_000_000);
    }

    let attributes_csv = "\
Ticker,Tech,Finance,Energy,Healthcare,Consumer,Utilities,Industrial,LargeCap,Domestic
AAPL,1,0,0,0,0,0,0,1,1
MSFT,1,0,0,0,0,0,0,1,1
JPM,0,1,0,0,0,0,0,1,1
XOM,0,0,1,0,0,0,0,1,1
JNJ,0,0,0,1,0,0,0,1,1
PG,0,0,0,0,1,0,0,1,1
NEE,0,0,0,0,0,1,0,1,1
CAT,0,0,0,0,0,0,1,1,1
";

    let returns_path = dir.path().join("returns.csv");
    let benchmark_path = dir.path().join("sp100returns.csv");
    let caps_path = dir.path().join("market_caps.csv");
    let attributes_path = dir.path().join("ticker_attributes.csv");

    std::fs::write(&returns_path, returns_csv).unwrap();
    std::fs::write(&benchmark_path, benchmark_csv).unwrap();
    std::fs::write(&caps_path, caps_csv).unwrap();
    std::fs::write(&attributes_path, attributes_csv).unwrap();

    (returns_path, benchmark_path, caps_path, attributes_path)
}

fn build_engine(dir: &TempDir) -> ReplicationEngine {
    let (returns_path, benchmark_path, caps_path, attributes_path) = write_fixtures(dir);
    let data_config = DataConfig::default();

    let returns = load_returns(&returns_path, &data_config).unwrap();
    let benchmark =
        load_benchmark(&benchmark_path, "Portfolio_Return", "SP100", &data_config).unwrap();
    let caps = load_caps(&caps_path, &data_config).unwrap();
    let attributes = load_attributes(&attributes_path, &data_config).unwrap();

    ReplicationEngine::new(
        EngineConfig {
            split: SplitConfig::default(),
            show_progress: false,
        },
        returns,
        benchmark,
        Box::new(CachedCapProvider::new(caps)),
    )
    .with_attributes(attributes)
}

/// Deterministic stand-in for the solver-backed strategies: picks the first
/// q tickers and cap-weights them, so the whole pipeline runs without AMPL.
struct FirstQCapWeighted;

impl Strategy for FirstQCapWeighted {
    fn name(&self) -> &str {
        "FirstQ"
    }

    fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
        let selected: Vec<String> = ctx.universe()[..ctx.q].to_vec();
        let caps = ctx.caps.caps_for(&selected);
        Ok(cap_weights(&selected, &caps))
    }
}

#[test]
fn test_full_pipeline_from_csv_fixtures() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir);

    let grid = vec![
        GridPoint::new(2, 3),
        GridPoint::new(4, 3),
        GridPoint::new(8, 5),
    ];
    let result = engine.run(&mut FirstQCapWeighted, &grid).unwrap();

    assert_eq!(result.runs.len(), 3);
    assert_eq!(result.combined.n_columns(), 4);
    assert_eq!(result.combined.columns[0].0, "SP100");

    // 250 rows, 70/30 split -> 75 OOS rows.
    assert_eq!(result.combined.n_rows(), 75);

    for run in &result.runs {
        assert!(run.correlation.is_finite());
        assert!(run.correlation >= -1.0 && run.correlation <= 1.0);
        assert_eq!(run.skipped_periods, 0);
        assert_eq!(run.series.len(), 75);

        for weights in &run.period_weights {
            assert!(weights.positions.iter().all(|(_, w)| *w >= 0.0));
            assert!(weights.total_weight() <= 1.0 + 1e-9);
        }
    }

    // Holding the full universe tracks the universe-average benchmark almost
    // perfectly even under cap weighting; a 2-ticker portfolio cannot beat it.
    let full = &result.runs[2];
    let sparse = &result.runs[0];
    assert!(full.correlation > sparse.correlation - 1e-9);
}

#[test]
fn test_random_baseline_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir);
    let grid = vec![GridPoint::new(3, 4)];

    let result_a = engine.run(&mut RandomStrategy::new(42), &grid).unwrap();
    let result_b = engine.run(&mut RandomStrategy::new(42), &grid).unwrap();
    let result_c = engine.run(&mut RandomStrategy::new(7), &grid).unwrap();

    assert_eq!(
        result_a.runs[0].period_weights, result_b.runs[0].period_weights,
        "same seed must select the same portfolios"
    );
    assert_eq!(result_a.runs[0].series, result_b.runs[0].series);
    assert_ne!(result_a.runs[0].period_weights, result_c.runs[0].period_weights);
}

#[test]
fn test_combined_table_dates_match_oos_tail() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir);

    let result = engine
        .run(&mut FirstQCapWeighted, &[GridPoint::new(2, 3)])
        .unwrap();

    let oos_start = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        + chrono::Duration::days(175);
    assert_eq!(
        result.combined.dates.first().unwrap().date_naive(),
        oos_start
    );
    assert_eq!(result.combined.dates.len(), 75);
}

#[test]
fn test_export_roundtrip() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir);

    let result = engine
        .run(&mut FirstQCapWeighted, &[GridPoint::new(2, 3), GridPoint::new(4, 5)])
        .unwrap();

    let combined_path = dir.path().join("combined.csv");
    let correlations_path = dir.path().join("correlations.csv");
    export_combined_csv(&result.combined, &combined_path, &ExportConfig::default()).unwrap();
    export_correlations_csv(&result, &correlations_path, &ExportConfig::default()).unwrap();

    let combined = std::fs::read_to_string(&combined_path).unwrap();
    let header = combined.lines().next().unwrap();
    assert_eq!(header, "Date,SP100,(2,3),(4,5)");
    // Header plus one line per OOS date.
    assert_eq!(combined.lines().count(), 76);

    let correlations = std::fs::read_to_string(&correlations_path).unwrap();
    assert!(correlations.starts_with("q,m,correlation\n"));
    assert_eq!(correlations.lines().count(), 3);
}

#[test]
fn test_config_file_drives_grid() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("replication.toml");

    std::fs::write(
        &config_path,
        r#"
[grid]
qs = [2, 4]
ms = [3]

[split]
in_sample_ratio = 0.8
"#,
    )
    .unwrap();

    let config = ReplicationFileConfig::load(&config_path).unwrap();
    assert_eq!(
        config.grid.points(),
        vec![GridPoint::new(2, 3), GridPoint::new(4, 3)]
    );
    assert!((config.split.in_sample_ratio - 0.8).abs() < 1e-12);

    // The loaded split flows into the engine config.
    let engine_config = config.engine_config();
    assert!((engine_config.split.in_sample_ratio - 0.8).abs() < 1e-12);
}

#[test]
fn test_benchmark_shorter_than_oos_still_scores() {
    let dir = TempDir::new().unwrap();
    let (returns_path, _, caps_path, _) = write_fixtures(&dir);
    let data_config = DataConfig::default();

    let returns = load_returns(&returns_path, &data_config).unwrap();
    let caps = load_caps(&caps_path, &data_config).unwrap();

    // Benchmark with only 40 rows against a 75-row OOS window.
    let short_bench = mimic::types::BenchmarkSeries::new(
        "SHORT",
        (0..40).map(|i| (i as f64 * 0.9).sin() * 0.01).collect(),
    );

    let engine = ReplicationEngine::new(
        EngineConfig {
            show_progress: false,
            ..Default::default()
        },
        returns,
        short_bench,
        Box::new(CachedCapProvider::new(caps)),
    );

    let result = engine
        .run(&mut FirstQCapWeighted, &[GridPoint::new(2, 3)])
        .unwrap();

    // Scored over the 40-row overlap; still a finite correlation.
    assert!(result.runs[0].correlation.is_finite());
    // Combined table keeps the full OOS length, padding the benchmark.
    assert_eq!(result.combined.n_rows(), 75);
    assert!(result.combined.column("SHORT").unwrap()[74].is_nan());
}
