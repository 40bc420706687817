//! Mimic - an index-replication backtesting toolkit.
//!
//! # Overview
//!
//! Mimic backtests sparse index-tracking portfolios: from a universe of
//! equities it selects q tickers per rebalancing period, weights them by
//! market-cap share, and measures how closely the resulting portfolio
//! follows a reference index over the out-of-sample window.
//!
//! Three selection strategies are built in:
//!
//! - **Max correlation**: a cardinality-constrained MIP picks the q tickers
//!   that best represent the universe (solved externally)
//! - **Attribute match**: max-correlation selection followed by an LP that
//!   pulls sector/cap/region exposures toward fixed targets
//! - **Random**: a seeded uniform baseline
//!
//! The integer programs themselves are delegated to an external solver via
//! generated AMPL data files; this crate orchestrates data loading, window
//! partitioning, solver interchange, weighting, and scoring.
//!
//! # Quick Start
//!
//! ```no_run
//! use mimic::{
//!     data::{load_benchmark, load_returns, DataConfig},
//!     engine::{EngineConfig, ReplicationEngine},
//!     marketcap::CachedCapProvider,
//!     strategies::RandomStrategy,
//!     types::GridPoint,
//! };
//!
//! let data_config = DataConfig::default();
//! let returns = load_returns("data/returns.csv", &data_config).unwrap();
//! let benchmark =
//!     load_benchmark("data/sp100returns.csv", "Portfolio_Return", "SP100", &data_config)
//!         .unwrap();
//!
//! let caps = CachedCapProvider::new(Default::default());
//! let engine = ReplicationEngine::new(
//!     EngineConfig::default(),
//!     returns,
//!     benchmark,
//!     Box::new(caps),
//! );
//!
//! let mut strategy = RandomStrategy::new(42);
//! let result = engine
//!     .run(&mut strategy, &[GridPoint::new(10, 4), GridPoint::new(20, 4)])
//!     .unwrap();
//!
//! for run in &result.runs {
//!     println!("{}: correlation {:.4}", run.grid.label(), run.correlation);
//! }
//! ```
//!
//! # Creating Custom Strategies
//!
//! Implement the `Strategy` trait to plug in your own selection logic:
//!
//! ```
//! use mimic::error::Result;
//! use mimic::strategy::{PeriodContext, Strategy};
//!
//! struct TopOfUniverse;
//!
//! impl Strategy for TopOfUniverse {
//!     fn name(&self) -> &str {
//!         "Top of Universe"
//!     }
//!
//!     fn select(&mut self, ctx: &PeriodContext) -> Result<Vec<(String, f64)>> {
//!         let w = 1.0 / ctx.q as f64;
//!         Ok(ctx.universe()[..ctx.q].iter().map(|t| (t.clone(), w)).collect())
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: Core data types (ReturnsTable, GridPoint, CombinedTable)
//! - [`data`]: CSV loading for returns, benchmark, attributes, and caps
//! - [`periods`]: IS/OOS splitting and rebalancing-period partitioning
//! - [`stats`]: Pearson correlation and correlation matrices
//! - [`solver`]: External optimizer interchange (data files, subprocess, parsing)
//! - [`marketcap`]: Market-cap providers and cap-share weighting
//! - [`strategy`]: Strategy trait and per-period context
//! - [`strategies`]: Built-in selection strategies
//! - [`engine`]: Grid-sweep orchestration
//! - [`report`]: Tracking metrics and terminal reporting
//! - [`export`]: CSV/JSON persistence of results
//! - [`config`]: TOML configuration file support
//! - [`metadata`]: Experiment ids, config hashes, data checksums

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod export;
pub mod marketcap;
pub mod metadata;
pub mod periods;
pub mod report;
pub mod solver;
pub mod stats;
pub mod strategies;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use engine::{EngineConfig, ReplicationEngine, ReplicationResult, TrackingResult};
pub use error::{ReplicationError, Result};
pub use strategy::{PeriodContext, Strategy};
pub use types::{
    AttributeTable, BenchmarkSeries, CapTable, CombinedTable, GridPoint, PeriodWeights,
    ReturnsTable, TrackingSeries,
};

// Data handling re-exports
pub use data::{load_attributes, load_benchmark, load_caps, load_returns, DataConfig};

// Selection strategies
pub use strategies::{default_targets, AttributeStrategy, MaxCorrStrategy, RandomStrategy};

// Market cap handling
pub use marketcap::{
    cap_weights, cap_weights_or_equal, CachedCapProvider, CapProvider, LiveCapProvider,
};

// Analytics and reporting
pub use report::{ResultFormatter, TrackingMetrics};

// Solver interchange
pub use solver::{AmplRunner, SolverConfig};
