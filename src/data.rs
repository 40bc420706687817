//! Data loading for returns, benchmark, attribute, and market-cap tables.

use crate::error::{ReplicationError, Result};
use crate::types::{AttributeTable, BenchmarkSeries, CapTable, ReturnsTable};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Data source configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format string for parsing (e.g., "%Y-%m-%d").
    pub date_format: Option<String>,
    /// Whether the CSV has headers.
    pub has_headers: bool,
    /// CSV delimiter character. If None, delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Store unparsable cells as NaN instead of failing.
    pub skip_invalid: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            has_headers: true,
            delimiter: None,
            skip_invalid: true,
        }
    }
}

/// Detect the CSV delimiter by analyzing the first few lines of the file.
///
/// Tries common delimiters (comma, tab, semicolon, pipe) and returns the one
/// that produces the most consistent column count across lines.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let lines: Vec<String> = reader.lines().take(5).map_while(|l| l.ok()).collect();

    if lines.is_empty() {
        return Ok(b',');
    }

    let delimiters = [b',', b'\t', b';', b'|'];

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in &delimiters {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();

        let first_count = counts[0];
        let all_consistent = counts.iter().all(|&c| c == first_count);

        // Wide tables need at least a date column plus one value column.
        if all_consistent && first_count >= 2 && first_count > best_score {
            best_score = first_count;
            best_delimiter = delim;
        }
    }

    debug!(
        "Detected delimiter {:?} with score {}",
        best_delimiter as char, best_score
    );
    Ok(best_delimiter)
}

/// Parse a date string with multiple format attempts.
pub(crate) fn parse_datetime(s: &str, format: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%d-%b-%Y",
        "%b %d, %Y",
    ];

    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }

    // Unix timestamp fallback
    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt);
        }
    }

    Err(ReplicationError::DataError(format!(
        "Could not parse date: '{}'",
        s
    )))
}

fn open_reader(path: &Path, config: &DataConfig) -> Result<csv::Reader<File>> {
    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    Ok(ReaderBuilder::new()
        .has_headers(config.has_headers)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?)
}

/// Load a wide returns matrix: first column is the date, every other header
/// is a ticker. Rows are sorted by date and duplicate dates removed.
pub fn load_returns(path: impl AsRef<Path>, config: &DataConfig) -> Result<ReturnsTable> {
    let path = path.as_ref();
    info!("Loading returns from: {}", path.display());

    let mut reader = open_reader(path, config)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ReplicationError::DataError(format!(
            "Returns file {} needs a date column plus at least one ticker",
            path.display()
        )));
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut dated_rows: Vec<(DateTime<Utc>, Vec<f64>)> = Vec::new();
    let mut skipped = 0usize;

    for (row_num, record) in reader.records().enumerate() {
        let record = record?;
        let date_cell = record.get(0).unwrap_or("").trim();

        let timestamp = match parse_datetime(date_cell, config.date_format.as_deref()) {
            Ok(ts) => ts,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {} due to date parse error: {}", row_num + 1, e);
                    skipped += 1;
                    continue;
                } else {
                    return Err(e);
                }
            }
        };

        let mut row = Vec::with_capacity(tickers.len());
        for i in 0..tickers.len() {
            let cell = record.get(i + 1).unwrap_or("").trim();
            match cell.parse::<f64>() {
                Ok(v) => row.push(v),
                Err(_) if config.skip_invalid => row.push(f64::NAN),
                Err(_) => {
                    return Err(ReplicationError::DataError(format!(
                        "Bad return value '{}' at row {} column {}",
                        cell,
                        row_num + 1,
                        tickers[i]
                    )))
                }
            }
        }
        dated_rows.push((timestamp, row));
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }

    dated_rows.sort_by_key(|(ts, _)| *ts);
    let original_len = dated_rows.len();
    dated_rows.dedup_by_key(|(ts, _)| *ts);
    if dated_rows.len() < original_len {
        warn!(
            "Removed {} duplicate dates",
            original_len - dated_rows.len()
        );
    }

    if dated_rows.is_empty() {
        return Err(ReplicationError::NoData);
    }

    info!(
        "Loaded {} rows x {} tickers from {} to {}",
        dated_rows.len(),
        tickers.len(),
        dated_rows.first().map(|(ts, _)| ts.to_string()).unwrap_or_default(),
        dated_rows.last().map(|(ts, _)| ts.to_string()).unwrap_or_default()
    );

    let (dates, rows): (Vec<_>, Vec<_>) = dated_rows.into_iter().unzip();
    Ok(ReturnsTable::new(dates, tickers, rows))
}

/// Load the reference index return series from a named column.
///
/// A date column is tolerated but not required; alignment with portfolio
/// series is positional, in file order.
pub fn load_benchmark(
    path: impl AsRef<Path>,
    return_column: &str,
    label: &str,
    config: &DataConfig,
) -> Result<BenchmarkSeries> {
    let path = path.as_ref();
    info!("Loading benchmark returns from: {}", path.display());

    let mut reader = open_reader(path, config)?;

    let headers = reader.headers()?.clone();
    let col = headers
        .iter()
        .position(|h| h.trim() == return_column)
        .ok_or_else(|| {
            ReplicationError::DataError(format!(
                "Benchmark file {} has no '{}' column",
                path.display(),
                return_column
            ))
        })?;

    let mut returns = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let cell = record.get(col).unwrap_or("").trim();
        match cell.parse::<f64>() {
            Ok(v) => returns.push(v),
            Err(_) if config.skip_invalid => skipped += 1,
            Err(_) => {
                return Err(ReplicationError::DataError(format!(
                    "Bad benchmark value '{}'",
                    cell
                )))
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} invalid benchmark rows", skipped);
    }
    if returns.is_empty() {
        return Err(ReplicationError::NoData);
    }

    info!("Loaded {} benchmark returns", returns.len());
    Ok(BenchmarkSeries::new(label, returns))
}

/// Load the binary ticker attribute matrix.
///
/// Expects a `Ticker` column plus one 0/1 column per feature.
pub fn load_attributes(path: impl AsRef<Path>, config: &DataConfig) -> Result<AttributeTable> {
    let path = path.as_ref();
    info!("Loading ticker attributes from: {}", path.display());

    let mut reader = open_reader(path, config)?;

    let headers = reader.headers()?.clone();
    let ticker_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ticker"))
        .ok_or_else(|| {
            ReplicationError::DataError(format!(
                "Attribute file {} has no 'Ticker' column",
                path.display()
            ))
        })?;

    let features: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ticker_col)
        .map(|(_, h)| h.trim().to_string())
        .collect();

    let mut tickers = Vec::new();
    let mut flags = Vec::new();

    for record in reader.records() {
        let record = record?;
        let ticker = record.get(ticker_col).unwrap_or("").trim();
        if ticker.is_empty() {
            continue;
        }

        let mut row = Vec::with_capacity(features.len());
        for (i, _) in headers.iter().enumerate() {
            if i == ticker_col {
                continue;
            }
            let cell = record.get(i).unwrap_or("").trim();
            let flag = match cell {
                "1" => true,
                "0" | "" => false,
                other => {
                    return Err(ReplicationError::DataError(format!(
                        "Attribute cell for {} must be 0 or 1, got '{}'",
                        ticker, other
                    )))
                }
            };
            row.push(flag);
        }
        tickers.push(ticker.to_string());
        flags.push(row);
    }

    if tickers.is_empty() {
        return Err(ReplicationError::NoData);
    }

    info!(
        "Loaded attributes for {} tickers x {} features",
        tickers.len(),
        features.len()
    );
    Ok(AttributeTable::new(tickers, features, flags))
}

/// Load a pre-cached market capitalization table (`Ticker`,`MarketCap`).
pub fn load_caps(path: impl AsRef<Path>, config: &DataConfig) -> Result<CapTable> {
    let path = path.as_ref();
    info!("Loading market caps from: {}", path.display());

    let mut reader = open_reader(path, config)?;

    let headers = reader.headers()?.clone();
    let ticker_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ticker"))
        .unwrap_or(0);
    let cap_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("marketcap"))
        .ok_or_else(|| {
            ReplicationError::DataError(format!(
                "Cap file {} has no 'MarketCap' column",
                path.display()
            ))
        })?;

    let mut caps = CapTable::new();
    for record in reader.records() {
        let record = record?;
        let ticker = record.get(ticker_col).unwrap_or("").trim();
        if ticker.is_empty() {
            continue;
        }
        let cap = record
            .get(cap_col)
            .unwrap_or("")
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0);
        caps.insert(ticker.to_string(), cap.max(0.0));
    }

    if caps.is_empty() {
        return Err(ReplicationError::NoData);
    }

    info!("Loaded {} market caps", caps.len());
    Ok(caps)
}
