//! Risk policy tables.
//!
//! Each risk-tolerance variant carries three independent weight sets:
//! - a `RiskPreset` driving the composite score and the TVL floor,
//! - `McdaWeights` driving TOPSIS normalization (different semantic role,
//!   numerically independent from the preset weights),
//! - an additive per-style score bias.
//!
//! All tables are immutable and returned by value - no global mutable state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::PoolStyle;
use crate::types::RecommendError;

/// The three supported risk-tolerance variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    pub const ALL: [RiskTolerance; 3] = [
        RiskTolerance::Conservative,
        RiskTolerance::Moderate,
        RiskTolerance::Aggressive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTolerance {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskTolerance::Conservative),
            "moderate" => Ok(RiskTolerance::Moderate),
            "aggressive" => Ok(RiskTolerance::Aggressive),
            other => Err(RecommendError::InvalidRiskTolerance(other.to_string())),
        }
    }
}

// ============================================
// SCORING PRESETS
// ============================================

/// Composite-score weights and constraints for one risk variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPreset {
    /// Weight of the (sigmoid-squashed) period return.
    pub w_return: f64,
    /// Weight of the trading-activity proxy.
    pub w_throughput: f64,
    /// Weight of the log-scaled TVL score.
    pub w_tvl: f64,
    /// Weight of the yield-sustainability confidence.
    pub w_conf: f64,
    /// Multiplier on the impermanent-loss penalty.
    pub il_mult: f64,
    /// Annualized volatility floor for the downside estimate.
    pub vol_floor: f64,
    /// Minimum TVL a pool must carry before relaxation.
    pub min_tvl_usd: f64,
}

/// TOPSIS criterion weights for one risk variant.
///
/// Order of the array form matches `ranking::topsis::CRITERIA`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McdaWeights {
    pub period_return_pct: f64,
    pub tvl_usd: f64,
    pub throughput: f64,
    pub confidence: f64,
    pub downside_period: f64,
    pub il_penalty_pct_pts: f64,
}

impl McdaWeights {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.period_return_pct,
            self.tvl_usd,
            self.throughput,
            self.confidence,
            self.downside_period,
            self.il_penalty_pct_pts,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Renormalize so the weights sum to 1. A non-positive configured sum
    /// degenerates to all-zero weights rather than dividing by zero.
    pub fn normalized(&self) -> [f64; 6] {
        let total = self.sum();
        let mut out = self.as_array();
        for w in &mut out {
            *w = if total > 0.0 { *w / total } else { 0.0 };
        }
        out
    }
}

impl RiskTolerance {
    /// Composite-score preset for this variant.
    pub fn preset(self) -> RiskPreset {
        match self {
            RiskTolerance::Conservative => RiskPreset {
                w_return: 0.45,
                w_throughput: 0.20,
                w_tvl: 0.25,
                w_conf: 0.10,
                il_mult: 1.25,
                vol_floor: 0.15,
                min_tvl_usd: 5_000_000.0,
            },
            RiskTolerance::Moderate => RiskPreset {
                w_return: 0.55,
                w_throughput: 0.20,
                w_tvl: 0.15,
                w_conf: 0.10,
                il_mult: 1.00,
                vol_floor: 0.10,
                min_tvl_usd: 1_000_000.0,
            },
            RiskTolerance::Aggressive => RiskPreset {
                w_return: 0.65,
                w_throughput: 0.20,
                w_tvl: 0.05,
                w_conf: 0.10,
                il_mult: 0.75,
                vol_floor: 0.07,
                min_tvl_usd: 100_000.0,
            },
        }
    }

    /// TOPSIS criterion weights for this variant.
    pub fn mcda_weights(self) -> McdaWeights {
        match self {
            RiskTolerance::Conservative => McdaWeights {
                period_return_pct: 0.30,
                tvl_usd: 0.25,
                throughput: 0.15,
                confidence: 0.10,
                downside_period: 0.15,
                il_penalty_pct_pts: 0.05,
            },
            RiskTolerance::Moderate => McdaWeights {
                period_return_pct: 0.40,
                tvl_usd: 0.15,
                throughput: 0.20,
                confidence: 0.10,
                downside_period: 0.10,
                il_penalty_pct_pts: 0.05,
            },
            RiskTolerance::Aggressive => McdaWeights {
                period_return_pct: 0.50,
                tvl_usd: 0.10,
                throughput: 0.20,
                confidence: 0.10,
                downside_period: 0.07,
                il_penalty_pct_pts: 0.03,
            },
        }
    }

    /// Additive score bias per pool style, as a fraction of 100 score points.
    pub fn style_bias(self, style: PoolStyle) -> f64 {
        use PoolStyle::*;
        match self {
            RiskTolerance::Conservative => match style {
                Stable => 0.15,
                Lending => 0.10,
                Bluechip => 0.08,
                Farm => -0.12,
                Derivatives => -0.15,
                Volatile => -0.10,
            },
            RiskTolerance::Moderate => match style {
                Stable => 0.05,
                Lending => 0.03,
                Bluechip => 0.03,
                Farm => 0.03,
                Volatile => 0.00,
                Derivatives => -0.05,
            },
            RiskTolerance::Aggressive => match style {
                Farm => 0.15,
                Volatile => 0.10,
                Derivatives => 0.08,
                Stable => -0.10,
                Lending => -0.05,
                Bluechip => 0.00,
            },
        }
    }

    /// Additive score bias for non-single exposure. Conservative penalizes
    /// dual-sided positions, aggressive slightly favors them.
    pub fn exposure_bias(self, single_exposure: bool) -> f64 {
        if single_exposure {
            return 0.0;
        }
        match self {
            RiskTolerance::Conservative => -0.05,
            RiskTolerance::Moderate => 0.0,
            RiskTolerance::Aggressive => 0.02,
        }
    }
}
