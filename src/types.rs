//! Core data types for the replication toolkit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Market capitalization lookup: ticker -> cap in dollars.
pub type CapTable = HashMap<String, f64>;

/// A wide table of periodic returns: one row per date, one column per ticker.
///
/// Rows are kept sorted by date and deduplicated at load time. Cells that
/// failed to parse are stored as NaN and excluded pairwise from correlation
/// computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsTable {
    dates: Vec<DateTime<Utc>>,
    tickers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ReturnsTable {
    /// Create a table from pre-sorted rows.
    ///
    /// `rows` must be row-major: `rows[i][j]` is the return of `tickers[j]`
    /// on `dates[i]`.
    pub fn new(dates: Vec<DateTime<Utc>>, tickers: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(dates.len(), rows.len());
        debug_assert!(rows.iter().all(|r| r.len() == tickers.len()));
        Self {
            dates,
            tickers,
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_tickers(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    /// Index of a ticker column, if present.
    pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Column values for a ticker over a row range.
    pub fn column_range(&self, col: usize, start: usize, end: usize) -> Vec<f64> {
        self.rows[start..end].iter().map(|r| r[col]).collect()
    }

    /// Return value at (row, col).
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }
}

/// A reference index return series used as the tracking benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSeries {
    /// Display label, e.g. "SP100".
    pub label: String,
    /// Periodic returns, in file order.
    pub returns: Vec<f64>,
}

impl BenchmarkSeries {
    pub fn new(label: impl Into<String>, returns: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            returns,
        }
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Binary ticker attribute matrix (ticker x feature).
///
/// Cells are indicator flags, e.g. sector membership or cap-size bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTable {
    tickers: Vec<String>,
    features: Vec<String>,
    flags: Vec<Vec<bool>>,
}

impl AttributeTable {
    pub fn new(tickers: Vec<String>, features: Vec<String>, flags: Vec<Vec<bool>>) -> Self {
        debug_assert_eq!(tickers.len(), flags.len());
        debug_assert!(flags.iter().all(|r| r.len() == features.len()));
        Self {
            tickers,
            features,
            flags,
        }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Whether `ticker` carries `feature`. Unknown tickers or features are false.
    pub fn has(&self, ticker: &str, feature: &str) -> bool {
        let t = self.tickers.iter().position(|x| x == ticker);
        let f = self.features.iter().position(|x| x == feature);
        match (t, f) {
            (Some(t), Some(f)) => self.flags[t][f],
            _ => false,
        }
    }

    /// Number of tickers in `universe` carrying `feature`.
    pub fn support(&self, feature: &str, universe: &[String]) -> usize {
        universe.iter().filter(|t| self.has(t, feature)).count()
    }
}

/// A single (q, m) configuration in the backtest grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    /// Number of tickers selected per rebalancing period.
    pub q: usize,
    /// Number of rebalancing periods over the out-of-sample window.
    pub m: usize,
}

impl GridPoint {
    pub fn new(q: usize, m: usize) -> Self {
        Self { q, m }
    }

    /// Column label used in the combined output table.
    pub fn label(&self) -> String {
        format!("({},{})", self.q, self.m)
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q={} m={}", self.q, self.m)
    }
}

/// Weighted holdings for one rebalancing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodWeights {
    /// 1-based period index.
    pub period: usize,
    /// Ticker -> weight pairs, nonnegative, summing to at most one.
    pub positions: Vec<(String, f64)>,
}

impl PeriodWeights {
    pub fn new(period: usize, positions: Vec<(String, f64)>) -> Self {
        Self { period, positions }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of position weights.
    pub fn total_weight(&self) -> f64 {
        self.positions.iter().map(|(_, w)| w).sum()
    }
}

/// A dated portfolio return series produced by one grid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSeries {
    pub dates: Vec<DateTime<Utc>>,
    pub returns: Vec<f64>,
}

impl TrackingSeries {
    pub fn new(dates: Vec<DateTime<Utc>>, returns: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), returns.len());
        Self { dates, returns }
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Combined output table: benchmark column plus one column per grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedTable {
    /// Out-of-sample dates (row index).
    pub dates: Vec<DateTime<Utc>>,
    /// (label, series) columns; the benchmark is always first. Columns hold
    /// NaN where a period produced no selection.
    pub columns: Vec<(String, Vec<f64>)>,
}

impl CombinedTable {
    /// Create a table holding only the benchmark column, truncated or
    /// NaN-padded to the out-of-sample length.
    pub fn with_benchmark(dates: Vec<DateTime<Utc>>, benchmark: &BenchmarkSeries) -> Self {
        let n = dates.len();
        let mut col: Vec<f64> = benchmark.returns.iter().take(n).copied().collect();
        col.resize(n, f64::NAN);
        Self {
            dates,
            columns: vec![(benchmark.label.clone(), col)],
        }
    }

    /// Append a portfolio column. Series shorter than the table are NaN-padded.
    pub fn push_column(&mut self, label: String, mut series: Vec<f64>) {
        series.resize(self.dates.len(), f64::NAN);
        self.columns.push((label, series));
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Look up a column by label.
    pub fn column(&self, label: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| c.as_slice())
    }
}
