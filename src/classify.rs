//! Pool style classification.
//!
//! Assigns one coarse style tag per pool from its category tag, symbol
//! tokens, project identifier and exposure type. The rules are evaluated in
//! order and the first match wins: lending/stable-ness dominate over the
//! generic AMM classification, so the ordering must not be changed - it
//! decides which pools receive which risk-variant bias.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::PoolRecord;

/// Coarse pool style used for risk-variant score bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStyle {
    Lending,
    Stable,
    Derivatives,
    Farm,
    Bluechip,
    Volatile,
}

impl PoolStyle {
    pub const ALL: [PoolStyle; 6] = [
        PoolStyle::Lending,
        PoolStyle::Stable,
        PoolStyle::Derivatives,
        PoolStyle::Farm,
        PoolStyle::Bluechip,
        PoolStyle::Volatile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PoolStyle::Lending => "lending",
            PoolStyle::Stable => "stable",
            PoolStyle::Derivatives => "derivatives",
            PoolStyle::Farm => "farm",
            PoolStyle::Bluechip => "bluechip",
            PoolStyle::Volatile => "volatile",
        }
    }
}

impl fmt::Display for PoolStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// PROTOCOL / TOKEN SETS
// ============================================

/// Known lending protocols.
const LENDING_PROJECTS: [&str; 3] = ["aave-v3", "benqi", "radiant"];

/// Known automated-market-maker protocols.
const AMM_PROJECTS: [&str; 5] = ["trader-joe", "pangolin", "camelot", "sushiswap", "woo-fi"];

/// Symbol fragments that flag a stable pool.
const STABLE_TOKENS: [&str; 5] = ["USDC", "USDT", "DAI", "FRAX", "USD"];

/// Stable fragments checked inside the AMM sub-rule (narrower set, no FRAX).
const AMM_STABLE_TOKENS: [&str; 4] = ["USDC", "USDT", "DAI", "USD"];

/// Major-asset symbol fragments.
const MAJOR_TOKENS: [&str; 4] = ["BTC", "WBTC", "ETH", "WETH"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// True when the (uppercased) symbol names a major asset.
pub fn symbol_has_major(symbol_upper: &str) -> bool {
    contains_any(symbol_upper, &MAJOR_TOKENS)
}

/// True when the (uppercased) symbol names a stable token.
pub fn symbol_has_stable(symbol_upper: &str) -> bool {
    contains_any(symbol_upper, &STABLE_TOKENS)
}

/// Classify a pool into one style. First matching rule wins.
pub fn classify(pool: &PoolRecord) -> PoolStyle {
    let category = pool.category_key();
    let symbol = pool.symbol_upper();
    let project = pool.project_key();

    if category.contains("lend") || LENDING_PROJECTS.contains(&project.as_str()) {
        return PoolStyle::Lending;
    }
    if category.contains("stable") || symbol_has_stable(&symbol) {
        return PoolStyle::Stable;
    }
    if category.contains("deriv") || category.contains("perp") {
        return PoolStyle::Derivatives;
    }
    if AMM_PROJECTS.contains(&project.as_str()) {
        if contains_any(&symbol, &AMM_STABLE_TOKENS) {
            return PoolStyle::Stable;
        }
        return PoolStyle::Farm;
    }
    if symbol_has_major(&symbol) && pool.is_single_exposure() {
        return PoolStyle::Bluechip;
    }
    PoolStyle::Volatile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(category: &str, symbol: &str, project: &str, exposure: &str) -> PoolRecord {
        PoolRecord {
            category: Some(category.to_string()),
            symbol: Some(symbol.to_string()),
            project: Some(project.to_string()),
            exposure: Some(exposure.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_lending_by_category_and_project() {
        assert_eq!(
            classify(&pool("Lending", "AVAX", "someproto", "single")),
            PoolStyle::Lending
        );
        assert_eq!(
            classify(&pool("", "USDC", "aave-v3", "single")),
            PoolStyle::Lending
        );
    }

    #[test]
    fn test_lending_dominates_stable() {
        // A USDC lending market is lending, not stable - rule order matters.
        assert_eq!(
            classify(&pool("Lending", "USDC", "benqi", "single")),
            PoolStyle::Lending
        );
    }

    #[test]
    fn test_stable_by_symbol() {
        assert_eq!(
            classify(&pool("", "USDT.e", "someproto", "single")),
            PoolStyle::Stable
        );
        assert_eq!(
            classify(&pool("Stablecoins", "XYZ", "someproto", "dual")),
            PoolStyle::Stable
        );
    }

    #[test]
    fn test_derivatives() {
        assert_eq!(
            classify(&pool("Perpetuals", "GLP", "someproto", "multi")),
            PoolStyle::Derivatives
        );
    }

    #[test]
    fn test_amm_splits_stable_and_farm() {
        assert_eq!(
            classify(&pool("dex", "WAVAX-USDC", "trader-joe", "dual")),
            PoolStyle::Stable
        );
        assert_eq!(
            classify(&pool("dex", "WAVAX-JOE", "trader-joe", "dual")),
            PoolStyle::Farm
        );
    }

    #[test]
    fn test_bluechip_requires_single_exposure() {
        assert_eq!(
            classify(&pool("", "WETH", "someproto", "single")),
            PoolStyle::Bluechip
        );
        // Dual exposure major falls through to volatile.
        assert_eq!(
            classify(&pool("", "WETH-AVAX", "someproto", "dual")),
            PoolStyle::Volatile
        );
    }

    #[test]
    fn test_default_volatile() {
        assert_eq!(
            classify(&pool("", "JOE", "someproto", "dual")),
            PoolStyle::Volatile
        );
        assert_eq!(classify(&PoolRecord::default()), PoolStyle::Volatile);
    }
}
