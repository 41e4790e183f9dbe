//! Candidate selection: dedupe, adaptive TVL-floor relaxation and
//! diversification.
//!
//! The relaxation loop is a bounded state machine: level 0..4, each level
//! multiplying the risk variant's minimum-TVL floor by a fixed factor. A
//! level is a pure function of (level, universe, request) - filter, score,
//! rank, diversify, backfill - so each level is testable in isolation. The
//! loop stops at the first level that yields enough results, or after the
//! fully relaxed last level.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{PoolScorer, TopsisRanker};
use crate::policy::RiskTolerance;
use crate::types::{PoolRecord, ScoredPool};

/// TVL-floor multipliers per relaxation level, strictest first.
pub const RELAX_FACTORS: [f64; 5] = [1.0, 0.6, 0.4, 0.2, 0.0];

/// Outcome of one relaxation level.
pub struct LevelResult {
    pub level: usize,
    pub tvl_floor: f64,
    pub results: Vec<ScoredPool>,
}

/// Final selection with the realized constraints.
pub struct SelectionOutcome {
    pub results: Vec<ScoredPool>,
    pub tvl_floor_used: f64,
    pub levels_run: usize,
}

pub struct CandidateSelector {
    risk: RiskTolerance,
    chain: String,
    top_n: usize,
}

impl CandidateSelector {
    pub fn new(risk: RiskTolerance, chain: &str, top_n: usize) -> Self {
        Self {
            risk,
            chain: chain.to_lowercase(),
            top_n,
        }
    }

    /// Run the full relaxation loop over a prepared universe.
    ///
    /// Never errors: an empty universe (or one that empties at every floor)
    /// yields the final, most-relaxed level's possibly-empty result.
    pub fn select(
        &self,
        universe: &[PoolRecord],
        principal: f64,
        horizon_months: u32,
    ) -> SelectionOutcome {
        // Idempotent with prepare_universe; callers handing in a raw universe
        // still get one entry per (project, symbol).
        let universe = dedupe_by_project_symbol(universe.to_vec());

        let mut last = LevelResult {
            level: 0,
            tvl_floor: self.risk.preset().min_tvl_usd,
            results: Vec::new(),
        };

        for level in 0..RELAX_FACTORS.len() {
            last = self.run_level(level, &universe, principal, horizon_months);
            debug!(
                level,
                tvl_floor = last.tvl_floor,
                results = last.results.len(),
                "relaxation level complete"
            );
            if last.results.len() >= self.top_n {
                break;
            }
        }

        let mut results = last.results;
        for row in &mut results {
            row.tvl_floor_applied = Some(last.tvl_floor);
        }

        SelectionOutcome {
            results,
            tvl_floor_used: last.tvl_floor,
            levels_run: last.level + 1,
        }
    }

    /// One relaxation level: filter to chain and floor, score, rank,
    /// diversify by project, backfill by pool id.
    pub fn run_level(
        &self,
        level: usize,
        universe: &[PoolRecord],
        principal: f64,
        horizon_months: u32,
    ) -> LevelResult {
        let factor = RELAX_FACTORS.get(level).copied().unwrap_or(0.0);
        let tvl_floor = self.risk.preset().min_tvl_usd * factor;

        let scorer = PoolScorer::new(self.risk, &self.chain);
        let scored: Vec<ScoredPool> = universe
            .iter()
            .filter(|p| p.chain_key() == self.chain && p.tvl() >= tvl_floor)
            .filter_map(|p| scorer.score(p, principal, horizon_months))
            .collect();

        let ranked = TopsisRanker::new(self.risk).rank(scored);

        LevelResult {
            level,
            tvl_floor,
            results: self.diversify(ranked),
        }
    }

    /// Keep at most one entry per project while walking the ranked order,
    /// then backfill from the remaining ranked rows (skipping already-chosen
    /// pool ids) until `top_n` is reached or the list is exhausted.
    fn diversify(&self, ranked: Vec<ScoredPool>) -> Vec<ScoredPool> {
        let mut chosen: Vec<ScoredPool> = Vec::with_capacity(self.top_n);
        let mut seen_projects: HashSet<String> = HashSet::new();
        let mut seen_pools: HashSet<String> = HashSet::new();

        for row in &ranked {
            if chosen.len() >= self.top_n {
                break;
            }
            let project = row.project_key();
            if seen_projects.contains(&project) {
                continue;
            }
            seen_projects.insert(project);
            seen_pools.insert(row.pool_id().to_string());
            chosen.push(row.clone());
        }

        if chosen.len() < self.top_n {
            for row in ranked {
                if chosen.len() >= self.top_n {
                    break;
                }
                if seen_pools.contains(row.pool_id()) {
                    continue;
                }
                seen_pools.insert(row.pool_id().to_string());
                chosen.push(row);
            }
        }

        chosen
    }
}

/// Deduplicate by (project, symbol), keeping the deepest pool per key.
pub fn dedupe_by_project_symbol(pools: Vec<PoolRecord>) -> Vec<PoolRecord> {
    let mut buckets: HashMap<(String, String), PoolRecord> = HashMap::new();
    for pool in pools {
        let key = (pool.project_key(), pool.symbol_upper());
        match buckets.get(&key) {
            Some(existing) if existing.tvl() >= pool.tvl() => {}
            _ => {
                buckets.insert(key, pool);
            }
        }
    }
    let mut out: Vec<PoolRecord> = buckets.into_values().collect();
    // HashMap iteration order is arbitrary; restore a deterministic order.
    sort_by_tvl_desc(&mut out);
    out
}

/// Stable TVL-descending sort with pool id as the final tie-break.
fn sort_by_tvl_desc(pools: &mut [PoolRecord]) {
    pools.sort_by(|a, b| {
        b.tvl()
            .partial_cmp(&a.tvl())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pool_id().cmp(b.pool_id()))
    });
}

/// Build the pre-scoring universe: drop rows without a pool id, merge
/// duplicate ids keeping the highest-TVL row, sort TVL-descending, dedupe by
/// (project, symbol) and apply the universe-size cap.
pub fn prepare_universe(pools: Vec<PoolRecord>, cap: usize) -> Vec<PoolRecord> {
    let mut by_id: HashMap<String, PoolRecord> = HashMap::new();
    for pool in pools {
        let id = pool.pool_id().to_string();
        // An id-less row cannot be merged or backfilled deterministically.
        if id.is_empty() {
            continue;
        }
        match by_id.get(&id) {
            Some(existing) if existing.tvl() >= pool.tvl() => {}
            _ => {
                by_id.insert(id, pool);
            }
        }
    }

    let mut merged: Vec<PoolRecord> = by_id.into_values().collect();
    sort_by_tvl_desc(&mut merged);

    let mut deduped = dedupe_by_project_symbol(merged);
    deduped.truncate(cap);
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(id: &str, project: &str, symbol: &str, tvl: f64, apy: f64) -> PoolRecord {
        PoolRecord {
            pool: Some(id.to_string()),
            project: Some(project.to_string()),
            chain: Some("avalanche".to_string()),
            symbol: Some(symbol.to_string()),
            exposure: Some("single".to_string()),
            tvl_usd: Some(tvl),
            apy: Some(apy),
            ..Default::default()
        }
    }

    #[test]
    fn test_dedupe_keeps_highest_tvl() {
        let deduped = dedupe_by_project_symbol(vec![
            pool("p1", "joe", "USDC", 1e6, 5.0),
            pool("p2", "joe", "USDC", 2e6, 4.0),
            pool("p3", "joe", "WAVAX", 5e5, 8.0),
        ]);
        assert_eq!(deduped.len(), 2);
        let usdc = deduped
            .iter()
            .find(|p| p.symbol_upper() == "USDC")
            .unwrap();
        assert_eq!(usdc.pool_id(), "p2");
    }

    #[test]
    fn test_prepare_universe_merges_and_caps() {
        let universe = prepare_universe(
            vec![
                pool("p1", "joe", "USDC", 1e6, 5.0),
                pool("p1", "joe", "USDC", 3e6, 5.0), // same id, deeper snapshot
                pool("p2", "benqi", "AVAX", 2e6, 6.0),
                pool("p3", "pangolin", "PNG", 5e5, 9.0),
            ],
            2,
        );
        assert_eq!(universe.len(), 2);
        assert_eq!(universe[0].pool_id(), "p1");
        assert_eq!(universe[0].tvl(), 3e6);
        assert_eq!(universe[1].pool_id(), "p2");
    }

    #[test]
    fn test_prepare_universe_drops_idless_rows() {
        let mut no_id = pool("", "joe", "USDC", 5e6, 5.0);
        no_id.pool = None;
        let universe = prepare_universe(
            vec![
                no_id,
                pool("", "benqi", "AVAX", 4e6, 6.0), // empty id string
                pool("p1", "pangolin", "PNG", 1e6, 9.0),
            ],
            10,
        );
        assert_eq!(universe.len(), 1);
        assert_eq!(universe[0].pool_id(), "p1");
    }

    #[test]
    fn test_scenario_c_relaxation_reaches_level_two() {
        // Both pools sit below the moderate 1M floor but above 0.4x of it,
        // so levels 0 (1.0x) and 1 (0.6x) must come up short.
        let universe = vec![
            pool("p1", "joe", "WAVAX", 450_000.0, 12.0),
            pool("p2", "benqi", "AVAX", 500_000.0, 7.0),
        ];
        let selector = CandidateSelector::new(RiskTolerance::Moderate, "avalanche", 2);
        let outcome = selector.select(&universe, 100.0, 6);

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.levels_run, 3);
        assert!((outcome.tvl_floor_used - 400_000.0).abs() < 1e-9);
        for row in &outcome.results {
            assert_eq!(row.tvl_floor_applied, Some(400_000.0));
        }
    }

    #[test]
    fn test_scenario_d_empty_universe() {
        let selector = CandidateSelector::new(RiskTolerance::Moderate, "avalanche", 2);
        let outcome = selector.select(&[], 100.0, 6);
        assert!(outcome.results.is_empty());
        // Every level ran and the fully relaxed floor is the answer.
        assert_eq!(outcome.levels_run, RELAX_FACTORS.len());
        assert_eq!(outcome.tvl_floor_used, 0.0);
    }

    #[test]
    fn test_wrong_chain_yields_empty() {
        let universe = vec![pool("p1", "joe", "USDC", 1e7, 5.0)];
        let selector = CandidateSelector::new(RiskTolerance::Moderate, "ethereum", 1);
        let outcome = selector.select(&universe, 100.0, 6);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_floors_non_increasing_and_bounded() {
        let selector = CandidateSelector::new(RiskTolerance::Conservative, "avalanche", 3);
        let mut prev = f64::INFINITY;
        for level in 0..RELAX_FACTORS.len() {
            let result = selector.run_level(level, &[], 100.0, 6);
            assert!(result.tvl_floor <= prev, "floor increased at level {level}");
            prev = result.tvl_floor;
        }
        assert_eq!(prev, 0.0);
    }

    #[test]
    fn test_diversification_one_per_project() {
        let universe = vec![
            pool("p1", "joe", "USDC", 9e6, 5.0),
            pool("p2", "joe", "WAVAX", 8e6, 6.0),
            pool("p3", "benqi", "AVAX", 7e6, 4.0),
            pool("p4", "pangolin", "PNG", 6e6, 3.0),
        ];
        let selector = CandidateSelector::new(RiskTolerance::Aggressive, "avalanche", 3);
        let outcome = selector.select(&universe, 100.0, 6);

        assert_eq!(outcome.results.len(), 3);
        let projects: HashSet<String> = outcome.results.iter().map(|r| r.project_key()).collect();
        assert_eq!(projects.len(), 3, "projects must be distinct");
    }

    #[test]
    fn test_backfill_when_projects_exhausted() {
        // Only two distinct projects for three slots: the third comes from
        // the backfill pass and duplicates a project.
        let universe = vec![
            pool("p1", "joe", "USDC", 9e6, 5.0),
            pool("p2", "joe", "WAVAX", 8e6, 6.0),
            pool("p3", "benqi", "AVAX", 7e6, 4.0),
        ];
        let selector = CandidateSelector::new(RiskTolerance::Aggressive, "avalanche", 3);
        let outcome = selector.select(&universe, 100.0, 6);

        assert_eq!(outcome.results.len(), 3);
        let ids: HashSet<&str> = outcome.results.iter().map(|r| r.pool_id()).collect();
        assert_eq!(ids.len(), 3, "backfill must not duplicate pool ids");
    }

    #[test]
    fn test_level_is_pure() {
        let universe = vec![
            pool("p1", "joe", "USDC", 9e6, 5.0),
            pool("p2", "benqi", "AVAX", 7e6, 4.0),
        ];
        let selector = CandidateSelector::new(RiskTolerance::Moderate, "avalanche", 2);
        let a = selector.run_level(0, &universe, 100.0, 6);
        let b = selector.run_level(0, &universe, 100.0, 6);
        assert_eq!(
            serde_json::to_string(&a.results).unwrap(),
            serde_json::to_string(&b.results).unwrap()
        );
    }
}
