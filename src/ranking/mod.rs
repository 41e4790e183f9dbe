//! The scoring-and-ranking core.
//!
//! Pure, synchronous computation over an already-materialized candidate set:
//! - per-pool scoring (forward yield, IL penalty, downside, composite score),
//! - set-wide TOPSIS ranking (needs the full candidate set for normalization),
//! - candidate selection (dedupe, adaptive TVL-floor relaxation,
//!   diversification).

mod scorer;
mod selector;
mod topsis;

pub use scorer::PoolScorer;
pub(crate) use scorer::forward_apy;
pub use selector::{
    dedupe_by_project_symbol, prepare_universe, CandidateSelector, LevelResult, SelectionOutcome,
    RELAX_FACTORS,
};
pub use topsis::TopsisRanker;

/// Round to `digits` decimal places. Scored records carry rounded values so
/// identical inputs serialize to byte-identical output.
pub fn round_to(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}

/// Clamp into [lo, hi].
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Logistic squash into (0, 1).
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
