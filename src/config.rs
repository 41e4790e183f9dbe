//! Runtime configuration.
//!
//! Everything has a working default so a bare `yieldscout recommend` run
//! works out of the box against the public DeFiLlama endpoints. Environment
//! variables (or a `.env` file) override the defaults; a TOML file can carry
//! a full profile.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::llama::{DEFAULT_PRICES_URL, DEFAULT_YIELDS_URL};

// ============================================
// DEFAULTS
// ============================================

/// Default target chain (yields-API naming).
const DEFAULT_CHAIN: &str = "avalanche";

/// WAVAX on Avalanche C-chain, the default reference token for USD
/// conversion of projected profits.
const DEFAULT_REF_TOKEN_ADDR: &str = "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7";

const DEFAULT_REF_TOKEN_SYMBOL: &str = "AVAX";

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_USER_AGENT: &str = concat!("yieldscout/", env!("CARGO_PKG_VERSION"));

/// Universe-size cap applied before scoring.
const DEFAULT_FETCH_LIMIT: usize = 600;
const FETCH_LIMIT_RANGE: std::ops::RangeInclusive<usize> = 50..=2000;

/// How many pools a recommendation returns.
const DEFAULT_TOP_N: usize = 2;
const TOP_N_RANGE: std::ops::RangeInclusive<usize> = 1..=5;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Universe ==========
    /// Target chain, yields-API naming (e.g. "avalanche", "ethereum").
    pub chain: String,

    /// Universe-size cap applied after the TVL sort.
    pub fetch_limit: usize,

    /// Default number of recommendations.
    pub top_n: usize,

    // ========== Provider endpoints ==========
    pub llama_yields_url: String,
    pub llama_prices_url: String,

    /// HTTP timeout for provider calls, in seconds.
    pub llama_timeout_secs: u64,

    pub user_agent: String,

    // ========== Reference token (USD conversion) ==========
    /// Token contract whose USD price converts projected profits.
    pub ref_token_addr: String,

    /// Display symbol for the reference token.
    pub ref_token_symbol: String,

    // ========== Narratives ==========
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    /// Whether `recommend` asks for narratives when the flag is omitted.
    pub include_narrative_default: bool,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            chain: env::var("CHAIN")
                .unwrap_or_else(|_| DEFAULT_CHAIN.to_string())
                .to_lowercase(),
            fetch_limit: env::var("FETCH_LIMIT")
                .unwrap_or_else(|_| DEFAULT_FETCH_LIMIT.to_string())
                .parse()
                .unwrap_or(DEFAULT_FETCH_LIMIT),
            top_n: env::var("TOP_N")
                .unwrap_or_else(|_| DEFAULT_TOP_N.to_string())
                .parse()
                .unwrap_or(DEFAULT_TOP_N),

            llama_yields_url: env::var("LLAMA_YIELDS_URL")
                .unwrap_or_else(|_| DEFAULT_YIELDS_URL.to_string()),
            llama_prices_url: env::var("LLAMA_PRICES_URL")
                .unwrap_or_else(|_| DEFAULT_PRICES_URL.to_string()),
            llama_timeout_secs: env::var("LLAMA_TIMEOUT")
                .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),

            ref_token_addr: env::var("REF_TOKEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_REF_TOKEN_ADDR.to_string()),
            ref_token_symbol: env::var("REF_TOKEN_SYMBOL")
                .unwrap_or_else(|_| DEFAULT_REF_TOKEN_SYMBOL.to_string()),

            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            include_narrative_default: env::var("INCLUDE_NARRATIVE_DEFAULT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration before a run
    pub fn validate(&self) -> Result<()> {
        if self.chain.trim().is_empty() {
            return Err(eyre::eyre!("CHAIN must not be empty"));
        }
        if !self.llama_yields_url.starts_with("http") {
            return Err(eyre::eyre!(
                "LLAMA_YIELDS_URL must be an http(s) URL (got '{}')",
                self.llama_yields_url
            ));
        }
        if !self.llama_prices_url.starts_with("http") {
            return Err(eyre::eyre!(
                "LLAMA_PRICES_URL must be an http(s) URL (got '{}')",
                self.llama_prices_url
            ));
        }
        if !FETCH_LIMIT_RANGE.contains(&self.fetch_limit) {
            return Err(eyre::eyre!(
                "FETCH_LIMIT should be between {} and {} (currently {})",
                FETCH_LIMIT_RANGE.start(),
                FETCH_LIMIT_RANGE.end(),
                self.fetch_limit
            ));
        }
        if !TOP_N_RANGE.contains(&self.top_n) {
            return Err(eyre::eyre!(
                "TOP_N should be between {} and {} (currently {})",
                TOP_N_RANGE.start(),
                TOP_N_RANGE.end(),
                self.top_n
            ));
        }
        if self.llama_timeout_secs == 0 {
            return Err(eyre::eyre!("LLAMA_TIMEOUT must be positive"));
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║             YIELDSCOUT - CONFIGURATION                     ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain:             {:^40} ║", self.chain);
        println!("║ Fetch Limit:       {:^40} ║", self.fetch_limit);
        println!("║ Top N:             {:^40} ║", self.top_n);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ REFERENCE TOKEN                                            ║");
        println!("║ • Symbol:          {:^40} ║", self.ref_token_symbol);
        println!("║ • Address:         {:^40} ║", self.ref_token_addr);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PROVIDER                                                   ║");
        println!("║ • Timeout:         {:>38} s ║", self.llama_timeout_secs);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ NARRATIVES                                                 ║");
        println!("║ • Model:           {:^40} ║", self.openai_model);
        println!(
            "║ • API Key:         {:^40} ║",
            if self.openai_api_key.is_some() {
                "✓ Configured"
            } else {
                "✗ Not Set (narratives disabled)"
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: DEFAULT_CHAIN.to_string(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            top_n: DEFAULT_TOP_N,
            llama_yields_url: DEFAULT_YIELDS_URL.to_string(),
            llama_prices_url: DEFAULT_PRICES_URL.to_string(),
            llama_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ref_token_addr: DEFAULT_REF_TOKEN_ADDR.to_string(),
            ref_token_symbol: DEFAULT_REF_TOKEN_SYMBOL.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            include_narrative_default: false,
        }
    }
}

// ============================================
// TESTS
// ============================================
