//! Market capitalization sources and cap-share weighting.
//!
//! Lookups are best-effort: a ticker whose cap cannot be resolved
//! contributes zero weight, and failures are logged, never propagated.

use crate::error::{ReplicationError, Result};
use crate::types::CapTable;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Pluggable market-capitalization source.
pub trait CapProvider {
    fn source_name(&self) -> &'static str;

    /// Resolve caps for the given tickers. Unknown or failed lookups map to
    /// 0.0 rather than erroring.
    fn caps_for(&self, tickers: &[String]) -> CapTable;
}

/// Cap source backed by a pre-loaded table (e.g. a cached CSV).
#[derive(Debug, Clone)]
pub struct CachedCapProvider {
    caps: CapTable,
}

impl CachedCapProvider {
    pub fn new(caps: CapTable) -> Self {
        Self { caps }
    }
}

impl CapProvider for CachedCapProvider {
    fn source_name(&self) -> &'static str {
        "cached"
    }

    fn caps_for(&self, tickers: &[String]) -> CapTable {
        tickers
            .iter()
            .map(|t| (t.clone(), self.caps.get(t).copied().unwrap_or(0.0)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "marketCap")]
    market_cap: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

/// Live cap source hitting the quote-summary endpoint of a financial-data
/// provider, one ticker at a time.
#[derive(Debug, Clone)]
pub struct LiveCapProvider {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl LiveCapProvider {
    pub fn new() -> Result<Self> {
        Self::new_with_base_url("https://query1.finance.yahoo.com".to_string())
    }

    pub fn new_with_base_url(base_url: String) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("mimic/0.1")
            .build()
            .map_err(|e| ReplicationError::CapLookupError(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn fetch_one(&self, ticker: &str) -> Result<f64> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url.trim_end_matches('/'),
            ticker
        );

        let response = self
            .http
            .get(&url)
            .query(&[("modules", "price")])
            .send()
            .map_err(|e| ReplicationError::CapLookupError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplicationError::CapLookupError(format!(
                "{} returned HTTP {}",
                ticker,
                status.as_u16()
            )));
        }

        let body: QuoteSummaryResponse = response
            .json()
            .map_err(|e| ReplicationError::CapLookupError(e.to_string()))?;

        let cap = body
            .quote_summary
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .and_then(|r| r.price)
            .and_then(|p| p.market_cap)
            .and_then(|m| m.raw)
            .unwrap_or(0.0);

        Ok(cap)
    }
}

impl CapProvider for LiveCapProvider {
    fn source_name(&self) -> &'static str {
        "live"
    }

    fn caps_for(&self, tickers: &[String]) -> CapTable {
        tickers
            .iter()
            .map(|t| {
                let cap = match self.fetch_one(t) {
                    Ok(cap) => {
                        debug!("Resolved cap for {}: {}", t, cap);
                        cap
                    }
                    Err(e) => {
                        warn!("Market cap lookup failed for {}: {}", t, e);
                        0.0
                    }
                };
                (t.clone(), cap)
            })
            .collect()
    }
}

/// Cap-share weights over the selected tickers: weight = cap / total cap.
///
/// When the total cap is zero every weight is zero, so the period ends up
/// uninvested rather than mis-weighted.
pub fn cap_weights(selected: &[String], caps: &CapTable) -> Vec<(String, f64)> {
    let total: f64 = selected
        .iter()
        .map(|t| caps.get(t).copied().unwrap_or(0.0).max(0.0))
        .sum();

    selected
        .iter()
        .map(|t| {
            let cap = caps.get(t).copied().unwrap_or(0.0).max(0.0);
            let weight = if total > 0.0 { cap / total } else { 0.0 };
            (t.clone(), weight)
        })
        .collect()
}

/// Cap-share weights with an equal-weight fallback when no caps resolve,
/// used by the random baseline.
pub fn cap_weights_or_equal(selected: &[String], caps: &CapTable) -> Vec<(String, f64)> {
    let total: f64 = selected
        .iter()
        .map(|t| caps.get(t).copied().unwrap_or(0.0).max(0.0))
        .sum();

    if total > 0.0 {
        cap_weights(selected, caps)
    } else {
        let equal = 1.0 / selected.len() as f64;
        selected.iter().map(|t| (t.clone(), equal)).collect()
    }
}
