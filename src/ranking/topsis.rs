//! Set-wide TOPSIS ranking.
//!
//! Classic Technique for Order of Preference by Similarity to Ideal Solution:
//! vector-normalize each criterion column over the current candidate set,
//! weight it, measure each candidate's Euclidean distance to the ideal-best
//! and ideal-worst points, and order by closeness coefficient.
//!
//! The ranking is set-relative: normalization depends on the whole candidate
//! universe, so the same pool can rank differently in a different universe.

use super::round_to;
use crate::policy::{McdaWeights, RiskTolerance};
use crate::types::ScoredPool;

/// Criteria in weight order. The last two are costs, the rest benefits.
const CRITERIA: usize = 6;
const BENEFIT: [bool; CRITERIA] = [true, true, true, true, false, false];

fn criterion_values(row: &ScoredPool) -> [f64; CRITERIA] {
    [
        row.period_return_pct,
        row.tvl_usd,
        row.throughput,
        row.confidence,
        row.downside_period,
        row.why.il_penalty_pct_pts,
    ]
}

pub struct TopsisRanker {
    weights: McdaWeights,
}

impl TopsisRanker {
    pub fn new(risk: RiskTolerance) -> Self {
        Self {
            weights: risk.mcda_weights(),
        }
    }

    pub fn with_weights(weights: McdaWeights) -> Self {
        Self { weights }
    }

    /// Rank the candidate set into a deterministic total order, attaching a
    /// closeness coefficient (`topsis_score`, 0-1) to each row.
    pub fn rank(&self, mut rows: Vec<ScoredPool>) -> Vec<ScoredPool> {
        if rows.is_empty() {
            return rows;
        }

        let weights = self.weights.normalized();

        // Euclidean norm per criterion column; a zero norm degenerates to
        // divisor 1 so the column collapses to zeros instead of dividing by
        // zero.
        let mut norms = [0.0f64; CRITERIA];
        for row in &rows {
            let values = criterion_values(row);
            for (norm, v) in norms.iter_mut().zip(values) {
                *norm += v * v;
            }
        }
        for norm in &mut norms {
            *norm = norm.sqrt();
            if *norm <= 0.0 {
                *norm = 1.0;
            }
        }

        // Weighted-normalized matrix.
        let weighted: Vec<[f64; CRITERIA]> = rows
            .iter()
            .map(|row| {
                let mut out = criterion_values(row);
                for i in 0..CRITERIA {
                    out[i] = out[i] / norms[i] * weights[i];
                }
                out
            })
            .collect();

        // Ideal best/worst per column: max/min for benefits, flipped for costs.
        let mut ideal_best = [0.0f64; CRITERIA];
        let mut ideal_worst = [0.0f64; CRITERIA];
        for i in 0..CRITERIA {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for w in &weighted {
                lo = lo.min(w[i]);
                hi = hi.max(w[i]);
            }
            if BENEFIT[i] {
                ideal_best[i] = hi;
                ideal_worst[i] = lo;
            } else {
                ideal_best[i] = lo;
                ideal_worst[i] = hi;
            }
        }

        for (row, w) in rows.iter_mut().zip(&weighted) {
            let mut d_plus = 0.0;
            let mut d_minus = 0.0;
            for i in 0..CRITERIA {
                d_plus += (w[i] - ideal_best[i]).powi(2);
                d_minus += (w[i] - ideal_worst[i]).powi(2);
            }
            let d_plus = d_plus.sqrt();
            let d_minus = d_minus.sqrt();
            let denom = d_plus + d_minus;
            // An undifferentiated candidate (both distances zero) gets the
            // neutral 0.5 rather than NaN.
            let cc = if denom > 0.0 { d_minus / denom } else { 0.5 };
            row.topsis_score = Some(round_to(cc, 6));
        }

        // Descending by closeness; ties broken by composite score, RAR and
        // period return. The sort is stable, so fully tied rows keep their
        // original relative order.
        rows.sort_by(|a, b| {
            let ka = (
                a.topsis_score.unwrap_or(0.0),
                a.score,
                a.rar,
                a.period_return_pct,
            );
            let kb = (
                b.topsis_score.unwrap_or(0.0),
                b.score,
                b.rar,
                b.period_return_pct,
            );
            kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
        });

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::PoolScorer;
    use crate::types::PoolRecord;

    fn scored(
        id: &str,
        period_return_pct: f64,
        tvl_usd: f64,
        downside: f64,
    ) -> ScoredPool {
        let scorer = PoolScorer::new(RiskTolerance::Moderate, "avalanche");
        let record = PoolRecord {
            pool: Some(id.to_string()),
            project: Some(id.to_string()),
            chain: Some("avalanche".to_string()),
            symbol: Some("X".to_string()),
            tvl_usd: Some(tvl_usd),
            ..Default::default()
        };
        let mut row = scorer.score(&record, 100.0, 6).unwrap();
        row.period_return_pct = period_return_pct;
        row.downside_period = downside;
        row
    }

    #[test]
    fn test_empty_input() {
        let ranker = TopsisRanker::new(RiskTolerance::Moderate);
        assert!(ranker.rank(Vec::new()).is_empty());
    }

    #[test]
    fn test_closeness_within_unit_interval() {
        let ranker = TopsisRanker::new(RiskTolerance::Moderate);
        let rows = vec![
            scored("a", 5.0, 1e7, 0.10),
            scored("b", -2.0, 5e5, 0.30),
            scored("c", 1.5, 2e6, 0.15),
        ];
        for row in ranker.rank(rows) {
            let cc = row.topsis_score.unwrap();
            assert!((0.0..=1.0).contains(&cc), "cc {cc} out of [0,1]");
        }
    }

    #[test]
    fn test_dominating_candidate_ranks_first() {
        let ranker = TopsisRanker::new(RiskTolerance::Moderate);
        let rows = vec![
            scored("weak", 1.0, 1e5, 0.40),
            scored("strong", 8.0, 1e8, 0.05),
        ];
        let ranked = ranker.rank(rows);
        assert_eq!(ranked[0].pool_id(), "strong");
        // A candidate best on every criterion has d+ = 0, CC = 1.
        assert_eq!(ranked[0].topsis_score, Some(1.0));
        assert_eq!(ranked[1].topsis_score, Some(0.0));
    }

    #[test]
    fn test_single_candidate_is_neutral() {
        // One candidate is its own ideal and anti-ideal: both distances are
        // zero, so the documented neutral 0.5 applies.
        let ranker = TopsisRanker::new(RiskTolerance::Moderate);
        let ranked = ranker.rank(vec![scored("only", 3.0, 1e6, 0.1)]);
        assert_eq!(ranked[0].topsis_score, Some(0.5));
    }

    #[test]
    fn test_identical_candidates_keep_order() {
        let ranker = TopsisRanker::new(RiskTolerance::Moderate);
        let ranked = ranker.rank(vec![
            scored("first", 3.0, 1e6, 0.1),
            scored("second", 3.0, 1e6, 0.1),
        ]);
        assert_eq!(ranked[0].pool_id(), "first");
        assert_eq!(ranked[1].pool_id(), "second");
    }

    #[test]
    fn test_tie_broken_by_composite_score() {
        let ranker = TopsisRanker::new(RiskTolerance::Moderate);
        let mut low = scored("low", 3.0, 1e6, 0.1);
        let mut high = scored("high", 3.0, 1e6, 0.1);
        low.score = 10.0;
        high.score = 90.0;
        let ranked = ranker.rank(vec![low, high]);
        assert_eq!(ranked[0].pool_id(), "high");
    }

    #[test]
    fn test_zero_weights_still_total_order() {
        let ranker = TopsisRanker::with_weights(McdaWeights {
            period_return_pct: 0.0,
            tvl_usd: 0.0,
            throughput: 0.0,
            confidence: 0.0,
            downside_period: 0.0,
            il_penalty_pct_pts: 0.0,
        });
        let ranked = ranker.rank(vec![
            scored("a", 5.0, 1e7, 0.10),
            scored("b", 1.0, 1e6, 0.20),
        ]);
        // All weighted values collapse to zero; every candidate is neutral.
        assert!(ranked.iter().all(|r| r.topsis_score == Some(0.5)));
    }

    #[test]
    fn test_determinism() {
        let ranker = TopsisRanker::new(RiskTolerance::Aggressive);
        let rows = || {
            vec![
                scored("a", 5.0, 1e7, 0.10),
                scored("b", -2.0, 5e5, 0.30),
                scored("c", 1.5, 2e6, 0.15),
                scored("d", 1.5, 2e6, 0.15),
            ]
        };
        let x = serde_json::to_string(&ranker.rank(rows())).unwrap();
        let y = serde_json::to_string(&ranker.rank(rows())).unwrap();
        assert_eq!(x, y);
    }
}
