//! Export utilities for replication results.
//!
//! - Combined return-series table (CSV)
//! - Per-configuration correlations (CSV)
//! - Full result (JSON)

use crate::engine::ReplicationResult;
use crate::error::Result;
use crate::types::CombinedTable;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Configuration for exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Date format for CSV exports.
    pub date_format: String,
    /// Decimal precision for numeric values.
    pub precision: usize,
    /// Delimiter for CSV files.
    pub delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            precision: 6,
            delimiter: ',',
        }
    }
}

/// Write the combined table: a date column, the benchmark column, and one
/// column per (q, m) configuration. NaN cells are written empty.
pub fn export_combined_csv(
    table: &CombinedTable,
    path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let d = config.delimiter;

    write!(writer, "Date")?;
    for (label, _) in &table.columns {
        write!(writer, "{}{}", d, label)?;
    }
    writeln!(writer)?;

    for (i, date) in table.dates.iter().enumerate() {
        write!(writer, "{}", date.format(&config.date_format))?;
        for (_, column) in &table.columns {
            let v = column[i];
            if v.is_finite() {
                write!(writer, "{}{:.*}", d, config.precision, v)?;
            } else {
                write!(writer, "{}", d)?;
            }
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    info!(
        "Exported combined table ({} rows x {} columns) to {}",
        table.n_rows(),
        table.n_columns(),
        path.display()
    );
    Ok(())
}

/// Write one row per grid configuration with its tracking correlation.
pub fn export_correlations_csv(
    result: &ReplicationResult,
    path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let d = config.delimiter;

    writeln!(writer, "q{}m{}correlation", d, d)?;
    for run in &result.runs {
        if run.correlation.is_finite() {
            writeln!(
                writer,
                "{}{}{}{}{:.*}",
                run.grid.q, d, run.grid.m, d, config.precision, run.correlation
            )?;
        } else {
            writeln!(writer, "{}{}{}{}", run.grid.q, d, run.grid.m, d)?;
        }
    }

    writer.flush()?;
    info!("Exported {} correlations to {}", result.runs.len(), path.display());
    Ok(())
}

/// Write the full result as pretty JSON.
pub fn export_result_json(result: &ReplicationResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, result)?;
    info!("Exported result JSON to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BenchmarkSeries;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_table() -> CombinedTable {
        let dates = (0..3)
            .map(|i| {
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64)
            })
            .collect();
        let bench = BenchmarkSeries::new("SP100", vec![0.01, -0.005, 0.002]);
        let mut table = CombinedTable::with_benchmark(dates, &bench);
        table.push_column("(2,3)".into(), vec![0.011, f64::NAN, 0.001]);
        table
    }

    #[test]
    fn test_export_combined_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined.csv");

        export_combined_csv(&sample_table(), &path, &ExportConfig::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "Date,SP100,(2,3)");
        assert_eq!(lines.next().unwrap(), "2024-01-02,0.010000,0.011000");
        // NaN cell is left empty.
        assert_eq!(lines.next().unwrap(), "2024-01-03,-0.005000,");
        assert_eq!(lines.next().unwrap(), "2024-01-04,0.002000,0.001000");
    }

    #[test]
    fn test_export_respects_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined.csv");
        let config = ExportConfig {
            precision: 2,
            ..Default::default()
        };

        export_combined_csv(&sample_table(), &path, &config).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("0.01,0.01"));
    }
}
