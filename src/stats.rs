//! Correlation statistics over return series.

use crate::types::ReturnsTable;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Pearson correlation coefficient between two equal-length series.
///
/// Observations where either side is non-finite are dropped pairwise,
/// matching how dataframe libraries handle missing returns. Returns 0.0 when
/// either series has no variance or fewer than two usable observations.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();

    if pairs.len() < 2 {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let x_mean: f64 = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean: f64 = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let covariance: f64 = pairs
        .iter()
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum::<f64>()
        / n;

    let x_variance: f64 = pairs.iter().map(|(x, _)| (x - x_mean).powi(2)).sum::<f64>() / n;
    let y_variance: f64 = pairs.iter().map(|(_, y)| (y - y_mean).powi(2)).sum::<f64>() / n;

    let x_std = x_variance.sqrt();
    let y_std = y_variance.sqrt();

    if x_std > 0.0 && y_std > 0.0 {
        (covariance / (x_std * y_std)).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// A symmetric ticker-by-ticker correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrMatrix {
    tickers: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CorrMatrix {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn n(&self) -> usize {
        self.tickers.len()
    }

    /// Correlation between the i-th and j-th tickers.
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Row of correlations for the i-th ticker.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i]
    }
}

/// Pairwise correlation matrix of all tickers over a row range of the table.
pub fn correlation_matrix(table: &ReturnsTable, rows: Range<usize>) -> CorrMatrix {
    let n = table.n_tickers();
    let columns: Vec<Vec<f64>> = (0..n)
        .map(|c| table.column_range(c, rows.start, rows.end))
        .collect();

    let mut values = vec![vec![0.0; n]; n];
    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(&columns[i], &columns[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrMatrix {
        tickers: table.tickers().to_vec(),
        values,
    }
}
