//! Core data types: raw pool records, scored records and request parameters.
//!
//! Upstream yield data is unreliable, so every provider-supplied field is an
//! `Option` and numeric fields go through a lenient deserializer. Accessor
//! methods document the default each field falls back to - defaulting never
//! raises an error, only a chain mismatch excludes a pool from scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::policy::RiskTolerance;

// ============================================
// ERRORS
// ============================================

/// Errors a recommendation request can produce.
///
/// Data-quality problems are NOT errors - malformed fields fall back to
/// documented defaults. Only malformed request parameters and provider
/// (network) failures surface here.
#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("unknown risk tolerance '{0}' (expected conservative|moderate|aggressive)")]
    InvalidRiskTolerance(String),

    #[error("principal must be positive (got {0})")]
    InvalidPrincipal(f64),

    #[error("horizon must be a positive number of months (got {0})")]
    InvalidHorizon(i64),

    #[error("result count must be positive")]
    InvalidTopN,

    #[error("data provider unavailable: {0}")]
    Provider(String),
}

// ============================================
// RAW POOL RECORD (provider input, read-only)
// ============================================

/// Accepts finite numbers, numeric strings or null; anything else (including
/// "NaN"/"inf" strings) becomes `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|f| f.is_finite()))
}

/// Provider-supplied prediction block (yield sustainability signal).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Predictions {
    #[serde(deserialize_with = "lenient_f64")]
    pub predicted_probability: Option<f64>,
}

/// One raw pool row as returned by the yields provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolRecord {
    // Identifiers
    pub pool: Option<String>,
    pub project: Option<String>,
    pub chain: Option<String>,
    pub symbol: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub pool_meta: Option<String>,

    // Liquidity
    #[serde(deserialize_with = "lenient_f64")]
    pub tvl_usd: Option<f64>,

    // Yield fields
    #[serde(deserialize_with = "lenient_f64")]
    pub apy: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub apy_base: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub apy_reward: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub apy_mean_30d: Option<f64>,
    #[serde(rename = "apyPct7D", deserialize_with = "lenient_f64")]
    pub apy_pct_7d: Option<f64>,

    // Trading activity
    #[serde(deserialize_with = "lenient_f64")]
    pub volume_usd_7d: Option<f64>,

    // Risk metadata
    pub exposure: Option<String>,
    pub il_risk: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub sigma: Option<f64>,
    pub stablecoin: Option<bool>,

    pub predictions: Option<Predictions>,

    // Token lists
    pub underlying_tokens: Option<Vec<String>>,
    pub reward_tokens: Option<Vec<String>>,
}

impl PoolRecord {
    /// TVL in USD. Default 0.
    pub fn tvl(&self) -> f64 {
        self.tvl_usd.unwrap_or(0.0)
    }

    /// Spot APY in percent. Default 0.
    pub fn apy_now(&self) -> f64 {
        self.apy.unwrap_or(0.0)
    }

    /// Reward-incentive APY component in percent. Default 0.
    pub fn apy_reward_or_zero(&self) -> f64 {
        self.apy_reward.unwrap_or(0.0)
    }

    /// 30-day mean APY. Defaults to the spot APY when the provider has no
    /// history for the pool.
    pub fn apy_mean_30d_or_spot(&self) -> f64 {
        self.apy_mean_30d.unwrap_or_else(|| self.apy_now())
    }

    /// 7-day APY momentum in percent. Default 0.
    pub fn apy_pct_7d_or_zero(&self) -> f64 {
        self.apy_pct_7d.unwrap_or(0.0)
    }

    /// 7-day traded volume in USD. Default 0.
    pub fn volume_7d(&self) -> f64 {
        self.volume_usd_7d.unwrap_or(0.0)
    }

    /// Provider yield-sustainability probability (0-100), if present.
    pub fn predicted_probability(&self) -> Option<f64> {
        self.predictions
            .as_ref()
            .and_then(|p| p.predicted_probability)
    }

    pub fn pool_id(&self) -> &str {
        self.pool.as_deref().unwrap_or("")
    }

    pub fn chain_key(&self) -> String {
        self.chain.as_deref().unwrap_or("").to_lowercase()
    }

    pub fn project_key(&self) -> String {
        self.project.as_deref().unwrap_or("").to_lowercase()
    }

    pub fn symbol_upper(&self) -> String {
        self.symbol.as_deref().unwrap_or("").to_uppercase()
    }

    pub fn category_key(&self) -> String {
        self.category.as_deref().unwrap_or("").to_lowercase()
    }

    pub fn exposure_key(&self) -> String {
        self.exposure.as_deref().unwrap_or("").to_lowercase()
    }

    pub fn is_single_exposure(&self) -> bool {
        self.exposure_key() == "single"
    }

    /// True when the provider explicitly marks the pool IL-free.
    pub fn il_risk_is_no(&self) -> bool {
        self.il_risk.as_deref().unwrap_or("").to_lowercase() == "no"
    }
}

// ============================================
// SCORED POOL (derived, immutable after scoring)
// ============================================

/// Score breakdown attached to every scored pool for explainability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhyBreakdown {
    pub tvl_score: f64,
    pub il_penalty_pct_pts: f64,
    pub exposure_bias: f64,
    pub style: String,
}

/// A fully derived, scored pool record.
///
/// Created once per scoring pass and never mutated afterwards, except for
/// `topsis_score` (attached by the ranker), `tvl_floor_applied` (copied in by
/// the relaxation loop) and the optional USD profit conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPool {
    // Identity carried over from the raw record
    pub pool: Option<String>,
    pub project: Option<String>,
    pub chain: Option<String>,
    pub symbol: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub exposure: Option<String>,
    pub il_risk: Option<String>,
    pub underlying_tokens: Option<Vec<String>>,

    // Derived financials
    pub tvl_usd: f64,
    pub apy_now: f64,
    pub apy_net_estimate: f64,
    pub period_return_pct: f64,
    pub downside_period: f64,
    pub rar: f64,
    pub score: f64,
    pub throughput: f64,
    pub confidence: f64,

    // Projection over the horizon (denominated in the reference asset)
    pub amount_start: f64,
    pub amount_end: f64,
    pub profit: f64,
    pub horizon_months: u32,

    pub why: WhyBreakdown,

    // Attached after scoring
    pub topsis_score: Option<f64>,
    pub tvl_floor_applied: Option<f64>,
    pub ref_price_usd: Option<f64>,
    pub profit_usd: Option<f64>,
}

impl ScoredPool {
    pub fn project_key(&self) -> String {
        self.project.as_deref().unwrap_or("").to_lowercase()
    }

    pub fn pool_id(&self) -> &str {
        self.pool.as_deref().unwrap_or("")
    }

    /// Convert the projected profit to USD at the given reference price.
    pub fn attach_usd(&mut self, ref_price_usd: Option<f64>) {
        self.ref_price_usd = ref_price_usd;
        self.profit_usd = ref_price_usd.map(|p| crate::ranking::round_to(self.profit * p, 2));
    }
}

// ============================================
// REQUEST / REPORT
// ============================================

/// Validated parameters for one recommendation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    /// Amount to allocate, in units of the reference asset.
    pub principal: f64,
    pub horizon_months: u32,
    pub risk: RiskTolerance,
    pub chain: String,
    pub top_n: usize,
    /// Universe-size cap applied before scoring.
    pub max_universe: usize,
}

impl RecommendRequest {
    pub fn validate(&self) -> Result<(), RecommendError> {
        if !(self.principal > 0.0) {
            return Err(RecommendError::InvalidPrincipal(self.principal));
        }
        if self.horizon_months == 0 {
            return Err(RecommendError::InvalidHorizon(self.horizon_months as i64));
        }
        if self.top_n == 0 {
            return Err(RecommendError::InvalidTopN);
        }
        Ok(())
    }
}

/// Final output of a recommendation pass.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendReport {
    pub inputs: RecommendRequest,
    pub universe_count: usize,
    pub tvl_floor_used: f64,
    pub top_n: Vec<ScoredPool>,
    pub explanations: Vec<crate::narrative::Narrative>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_numeric_fields() {
        let json = r#"{
            "pool": "abc",
            "chain": "Avalanche",
            "tvlUsd": 1000000,
            "apy": "5.5",
            "apyPct7D": null,
            "volumeUsd7d": {"bogus": true},
            "predictions": {"predictedProbability": 72}
        }"#;
        let rec: PoolRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.tvl(), 1_000_000.0);
        assert_eq!(rec.apy_now(), 5.5); // numeric string parses
        assert_eq!(rec.apy_pct_7d_or_zero(), 0.0);
        assert_eq!(rec.volume_7d(), 0.0); // non-numeric defaults to 0
        assert_eq!(rec.predicted_probability(), Some(72.0));
    }

    #[test]
    fn test_non_finite_strings_default() {
        // Rust's f64 parser accepts "NaN"/"inf"; those must not leak into
        // the arithmetic, they fall back like any other malformed value.
        let json = r#"{"apy": "NaN", "tvlUsd": "inf", "apyReward": "-inf"}"#;
        let rec: PoolRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.apy_now(), 0.0);
        assert_eq!(rec.tvl(), 0.0);
        assert_eq!(rec.apy_reward_or_zero(), 0.0);
    }

    #[test]
    fn test_missing_fields_default() {
        let rec: PoolRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(rec.tvl(), 0.0);
        assert_eq!(rec.apy_now(), 0.0);
        assert_eq!(rec.apy_mean_30d_or_spot(), 0.0);
        assert!(rec.predicted_probability().is_none());
        assert!(!rec.is_single_exposure());
        assert!(!rec.il_risk_is_no());
    }

    #[test]
    fn test_mean_30d_falls_back_to_spot() {
        let rec: PoolRecord = serde_json::from_str(r#"{"apy": 12.0}"#).unwrap();
        assert_eq!(rec.apy_mean_30d_or_spot(), 12.0);
    }

    #[test]
    fn test_request_validation() {
        let base = RecommendRequest {
            principal: 100.0,
            horizon_months: 6,
            risk: RiskTolerance::Moderate,
            chain: "avalanche".to_string(),
            top_n: 2,
            max_universe: 600,
        };
        assert!(base.validate().is_ok());

        let mut bad = base.clone();
        bad.principal = 0.0;
        assert!(matches!(
            bad.validate(),
            Err(RecommendError::InvalidPrincipal(_))
        ));

        let mut bad = base.clone();
        bad.horizon_months = 0;
        assert!(matches!(
            bad.validate(),
            Err(RecommendError::InvalidHorizon(_))
        ));

        let mut bad = base;
        bad.top_n = 0;
        assert!(matches!(bad.validate(), Err(RecommendError::InvalidTopN)));
    }
}
