//! Yieldscout - Risk-adjusted yield pool recommendation engine
//!
//! Turns a raw DeFiLlama pool universe into a risk-adjusted, multi-criteria
//! ranked shortlist for a given principal, horizon and risk tolerance.

pub mod classify;
pub mod config;
pub mod llama;
pub mod narrative;
pub mod policy;
pub mod ranking;
pub mod types;

// Re-export main types for convenience
pub use classify::PoolStyle;
pub use config::Config;
pub use llama::LlamaClient;
pub use narrative::Narrator;
pub use policy::RiskTolerance;
pub use ranking::{CandidateSelector, PoolScorer, TopsisRanker};
pub use types::{PoolRecord, RecommendError, RecommendRequest, ScoredPool};
