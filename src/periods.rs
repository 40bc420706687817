//! In-sample / out-of-sample splitting and rebalancing-period partitioning.
//!
//! The out-of-sample tail of the return history is divided into m contiguous
//! rebalancing periods. Each period gets a rolling in-sample window of
//! `split_point` rows ending at the period's first out-of-sample row, so the
//! selection for a period only ever sees history available at rebalance time.

use crate::error::{ReplicationError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Configuration for the in-sample / out-of-sample split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows used as in-sample history (e.g., 0.7 means the last
    /// 30% of rows form the out-of-sample window).
    pub in_sample_ratio: f64,
    /// Minimum rows required in each rebalancing period.
    pub min_rows_per_period: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            in_sample_ratio: 0.7,
            min_rows_per_period: 1,
        }
    }
}

impl SplitConfig {
    pub fn new(in_sample_ratio: f64) -> Self {
        assert!(
            in_sample_ratio > 0.0 && in_sample_ratio < 1.0,
            "In-sample ratio must be between 0 and 1"
        );
        Self {
            in_sample_ratio,
            ..Default::default()
        }
    }
}

/// A single rebalancing period over the out-of-sample window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// 1-based period index.
    pub index: usize,
    /// First row of the period (inclusive, into the full returns table).
    pub start_row: usize,
    /// One past the last row of the period.
    pub end_row: usize,
}

impl Period {
    pub fn len(&self) -> usize {
        self.end_row - self.start_row
    }

    pub fn is_empty(&self) -> bool {
        self.start_row >= self.end_row
    }

    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.end_row
    }
}

/// The complete partition of a return history for one value of m.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodPartition {
    /// Number of in-sample rows; the out-of-sample window starts here.
    pub split_point: usize,
    /// Total rows in the underlying table.
    pub n_rows: usize,
    /// The m rebalancing periods, in order.
    pub periods: Vec<Period>,
}

impl PeriodPartition {
    /// Partition `n_rows` of history into m rebalancing periods over the
    /// out-of-sample tail.
    ///
    /// The out-of-sample window is split into m chunks of `n_oos / m` rows;
    /// remainder rows are absorbed by the final period.
    pub fn build(n_rows: usize, m: usize, config: &SplitConfig) -> Result<Self> {
        if m == 0 {
            return Err(ReplicationError::ConfigError(
                "Number of periods must be positive".to_string(),
            ));
        }

        let split_point = (config.in_sample_ratio * n_rows as f64) as usize;
        let n_oos = n_rows.saturating_sub(split_point);
        let period_length = n_oos / m;

        if period_length < config.min_rows_per_period.max(1) {
            return Err(ReplicationError::DataError(format!(
                "Not enough out-of-sample rows ({}) for {} periods",
                n_oos, m
            )));
        }

        let mut periods = Vec::with_capacity(m);
        for i in 0..m {
            let start_row = split_point + i * period_length;
            let end_row = if i + 1 == m {
                n_rows
            } else {
                start_row + period_length
            };
            periods.push(Period {
                index: i + 1,
                start_row,
                end_row,
            });
        }

        debug!(
            "Partitioned {} rows: {} in-sample, {} out-of-sample across {} periods",
            n_rows, split_point, n_oos, m
        );

        Ok(Self {
            split_point,
            n_rows,
            periods,
        })
    }

    /// Number of out-of-sample rows covered by the partition.
    pub fn n_oos(&self) -> usize {
        self.n_rows - self.split_point
    }

    /// Row range of the whole out-of-sample window.
    pub fn oos_rows(&self) -> Range<usize> {
        self.split_point..self.n_rows
    }

    /// Rolling in-sample window for a period: `split_point` rows ending at
    /// the period's first out-of-sample row (inclusive).
    pub fn in_sample_window(&self, period: &Period) -> Range<usize> {
        let end = period.start_row + 1;
        let start = end.saturating_sub(self.split_point);
        start..end
    }

    /// Map an absolute row index to its 1-based period, if out-of-sample.
    pub fn period_of_row(&self, row: usize) -> Option<usize> {
        self.periods
            .iter()
            .find(|p| p.rows().contains(&row))
            .map(|p| p.index)
    }
}
