//! Performance benchmarks for the replication toolkit.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mimic::engine::{EngineConfig, ReplicationEngine};
use mimic::error::Result;
use mimic::marketcap::CachedCapProvider;
use mimic::periods::{PeriodPartition, SplitConfig};
use mimic::solver::render_selection_data;
use mimic::stats::{correlation_matrix, pearson};
use mimic::strategy::{PeriodContext, Strategy};
use mimic::types::{BenchmarkSeries, CapTable, GridPoint, ReturnsTable};
use chrono::{TimeZone, Utc};

/// Generate a synthetic returns table for benchmarking.
fn generate_table(n_rows: usize, n_tickers: usize) -> ReturnsTable {
    let dates = (0..n_rows)
        .map(|i| {
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(i as i64)
        })
        .collect();
    let tickers = (0..n_tickers).map(|i| format!("T{:03}", i)).collect();
    let rows = (0..n_rows)
        .map(|i| {
            (0..n_tickers)
                .map(|j| {
                    ((i as f64 * 0.7).sin() + ((i + j * 3) as f64 * 1.3).cos()) * 0.005
                })
                .collect()
        })
        .collect();
    ReturnsTable::new(dates, tickers, rows)
}

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

/// Benchmark correlation computations.
fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    let xs: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.7).sin() * 0.01).collect();
    let ys: Vec<f64> = (0..1000).map(|i| (i as f64 * 1.3).cos() * 0.01).collect();
    group.bench_function("pearson_1000", |b| {
        b.iter(|| pearson(black_box(&xs), black_box(&ys)))
    });

    for n_tickers in [20, 50, 100] {
        let table = generate_table(500, n_tickers);
        group.bench_with_input(
            BenchmarkId::new("matrix_500_rows", n_tickers),
            &table,
            |b, table| b.iter(|| correlation_matrix(black_box(table), 0..table.n_rows())),
        );
    }

    group.finish();
}

/// Benchmark period partitioning.
fn bench_partition(c: &mut Criterion) {
    let config = SplitConfig::default();
    c.bench_function("partition_10000_rows_12_periods", |b| {
        b.iter(|| PeriodPartition::build(black_box(10_000), black_box(12), &config))
    });
}

/// Benchmark solver data file rendering.
fn bench_render_data(c: &mut Criterion) {
    let table = generate_table(500, 100);
    let corr = correlation_matrix(&table, 0..table.n_rows());

    c.bench_function("render_selection_data_100_tickers", |b| {
        b.iter(|| render_selection_data(black_box(&corr), black_box(15)))
    });
}

/// Benchmark a full grid sweep with a trivial strategy (no external solver).
fn bench_grid_sweep(c: &mut Criterion) {
    let table = generate_table(1000, 30);
    let split = SplitConfig::default();
    let split_point = (split.in_sample_ratio * 1000.0) as usize;
    let bench_returns: Vec<f64> = (split_point..1000)
        .map(|i| (i as f64 * 0.7).sin() * 0.005)
        .collect();

    c.bench_function("grid_sweep_4_points", |b| {
        b.iter_batched(
            || {
                ReplicationEngine::new(
                    EngineConfig {
                        show_progress: false,
                        ..Default::default()
                    },
                    table.clone(),
                    BenchmarkSeries::new("INDEX", bench_returns.clone()),
                    Box::new(CachedCapProvider::new(CapTable::new())),
                )
            },
            |engine| {
                engine
                    .run(
                        &mut FirstQ,
                        &[
                            GridPoint::new(5, 4),
                            GridPoint::new(10, 4),
                            GridPoint::new(5, 8),
                            GridPoint::new(10, 8),
                        ],
                    )
                    .unwrap()
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_correlation,
    bench_partition,
    bench_render_data,
    bench_grid_sweep
);
criterion_main!(benches);
