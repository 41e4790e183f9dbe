//! DeFiLlama data provider - yields and spot prices.
//!
//! Wraps the public yields and coins endpoints. Pool rows are parsed one by
//! one so a single malformed row never poisons a whole response; reference
//! prices are cached briefly to keep repeated runs polite.
//!
//! API: https://yields.llama.fi/pools and https://coins.llama.fi/prices/current

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::ranking::{forward_apy, round_to};
use crate::types::{PoolRecord, RecommendError};

// ============================================
// CONSTANTS
// ============================================

/// Default yields endpoint.
pub const DEFAULT_YIELDS_URL: &str = "https://yields.llama.fi/pools";

/// Default current-prices endpoint.
pub const DEFAULT_PRICES_URL: &str = "https://coins.llama.fi/prices/current";

/// Cache duration for reference prices.
const PRICE_CACHE_SECS: u64 = 60;

/// Chain names (yields API) mapped to coins-API chain keys.
const COINS_CHAIN_KEYS: [(&str, &str); 7] = [
    ("avalanche", "avax"),
    ("avalanche-c", "avax"),
    ("ethereum", "ethereum"),
    ("polygon", "polygon"),
    ("bsc", "bsc"),
    ("arbitrum", "arbitrum"),
    ("optimism", "optimism"),
];

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct YieldsEnvelope {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PricesEnvelope {
    #[serde(default)]
    coins: HashMap<String, CoinPrice>,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    price: Option<f64>,
}

#[derive(Debug, Clone)]
struct CachedPrice {
    price: f64,
    fetched_at: Instant,
}

impl CachedPrice {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > Duration::from_secs(PRICE_CACHE_SECS)
    }
}

/// Coins-API key for a yields-API chain name. Unknown chains pass through
/// lowercased, which is what the coins API expects for most EVM chains.
pub fn coins_chain_key(chain: &str) -> String {
    let lower = chain.to_lowercase();
    COINS_CHAIN_KEYS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, key)| (*key).to_string())
        .unwrap_or(lower)
}

// ============================================
// CLIENT
// ============================================

pub struct LlamaClient {
    http_client: Client,
    yields_url: String,
    prices_url: String,
    price_cache: Arc<RwLock<HashMap<String, CachedPrice>>>,
}

impl LlamaClient {
    pub fn new(
        yields_url: &str,
        prices_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, RecommendError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| RecommendError::Provider(format!("http client: {e}")))?;

        Ok(Self {
            http_client,
            yields_url: yields_url.to_string(),
            prices_url: prices_url.to_string(),
            price_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Fetch pool rows, optionally narrowed by chain, project and a symbol
    /// substring. Filters are applied client-side; the yields endpoint always
    /// returns the full universe.
    pub async fn fetch_pools(
        &self,
        chain: Option<&str>,
        project: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<PoolRecord>, RecommendError> {
        let envelope: YieldsEnvelope = self
            .http_client
            .get(&self.yields_url)
            .send()
            .await
            .map_err(|e| RecommendError::Provider(format!("yields fetch: {e}")))?
            .json()
            .await
            .map_err(|e| RecommendError::Provider(format!("yields decode: {e}")))?;

        let total = envelope.data.len();
        let mut skipped = 0usize;
        let mut pools: Vec<PoolRecord> = Vec::with_capacity(total);
        for row in envelope.data {
            match serde_json::from_value::<PoolRecord>(row) {
                Ok(pool) => pools.push(pool),
                Err(e) => {
                    skipped += 1;
                    trace!("skipping malformed pool row: {e}");
                }
            }
        }
        if skipped > 0 {
            warn!("skipped {skipped}/{total} malformed pool rows");
        }

        let chain_key = chain.map(str::to_lowercase);
        let project_key = project.map(str::to_lowercase);
        let search_upper = search.map(str::to_uppercase);
        pools.retain(|p| {
            if let Some(ref c) = chain_key {
                if &p.chain_key() != c {
                    return false;
                }
            }
            if let Some(ref proj) = project_key {
                if &p.project_key() != proj {
                    return false;
                }
            }
            if let Some(ref q) = search_upper {
                if !p.symbol_upper().contains(q.as_str()) {
                    return false;
                }
            }
            true
        });

        debug!(pools = pools.len(), total, "fetched pool universe");
        Ok(pools)
    }

    /// Current USD prices for `chain:address` token keys. Tokens the coins
    /// API does not know are simply absent from the map.
    pub async fn fetch_prices(
        &self,
        chain: &str,
        token_addrs: &[String],
    ) -> Result<HashMap<String, f64>, RecommendError> {
        if token_addrs.is_empty() {
            return Ok(HashMap::new());
        }

        let chain_key = coins_chain_key(chain);
        let keys: Vec<String> = token_addrs
            .iter()
            .map(|addr| format!("{chain_key}:{addr}"))
            .collect();
        let url = format!("{}/{}", self.prices_url, keys.join(","));

        let envelope: PricesEnvelope = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| RecommendError::Provider(format!("prices fetch: {e}")))?
            .json()
            .await
            .map_err(|e| RecommendError::Provider(format!("prices decode: {e}")))?;

        let mut out = HashMap::new();
        for (key, coin) in envelope.coins {
            if let Some(price) = coin.price {
                // Key back to the bare address for the caller.
                let addr = key.split_once(':').map(|(_, a)| a).unwrap_or(&key);
                out.insert(addr.to_string(), price);
            }
        }
        Ok(out)
    }

    /// Cached USD price of the reference token. Returns `None` on a provider
    /// failure or an unknown token; callers fall back to native-denominated
    /// output.
    pub async fn reference_price(&self, chain: &str, token_addr: &str) -> Option<f64> {
        let cache_key = format!("{}:{}", coins_chain_key(chain), token_addr);
        {
            let cache = self.price_cache.read().await;
            if let Some(cached) = cache.get(&cache_key) {
                if !cached.is_stale() {
                    trace!("using cached reference price: {}", cached.price);
                    return Some(cached.price);
                }
            }
        }

        let price = match self.fetch_prices(chain, &[token_addr.to_string()]).await {
            Ok(prices) => prices.get(token_addr).copied(),
            Err(e) => {
                warn!("reference price fetch failed: {e}");
                None
            }
        };

        if let Some(price) = price {
            let mut cache = self.price_cache.write().await;
            cache.insert(
                cache_key,
                CachedPrice {
                    price,
                    fetched_at: Instant::now(),
                },
            );
        }
        price
    }
}

// ============================================
// BEST-MATCH LOOKUP
// ============================================

/// Condensed pool view for the lookup command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpView {
    pub pool: Option<String>,
    pub project: Option<String>,
    pub chain: Option<String>,
    pub symbol: Option<String>,
    pub url: Option<String>,
    pub tvl_usd: f64,
    pub apy_now: f64,
    pub apy_reward: f64,
    pub apy_mean_30d: f64,
    /// Forward-blended APY estimate, same blend the scorer uses.
    pub apy_forward: f64,
    pub il_risk: Option<String>,
    pub exposure: Option<String>,
    pub pool_meta: Option<String>,
    pub single_exposure: bool,
    pub stablecoin: bool,
    pub underlying_tokens: Vec<String>,
    pub reward_tokens: Vec<String>,
    /// USD price per underlying token address, where the coins API knows it.
    pub prices_usd: HashMap<String, f64>,
}

impl LpView {
    pub fn from_record(pool: &PoolRecord) -> Self {
        Self {
            pool: pool.pool.clone(),
            project: pool.project.clone(),
            chain: pool.chain.clone(),
            symbol: pool.symbol.clone(),
            url: pool.url.clone(),
            tvl_usd: pool.tvl(),
            apy_now: pool.apy_now(),
            apy_reward: pool.apy_reward_or_zero(),
            apy_mean_30d: pool.apy_mean_30d_or_spot(),
            apy_forward: round_to(forward_apy(pool), 4),
            il_risk: pool.il_risk.clone(),
            exposure: pool.exposure.clone(),
            pool_meta: pool.pool_meta.clone(),
            single_exposure: pool.is_single_exposure(),
            stablecoin: pool.stablecoin.unwrap_or(false),
            underlying_tokens: pool.underlying_tokens.clone().unwrap_or_default(),
            reward_tokens: pool.reward_tokens.clone().unwrap_or_default(),
            prices_usd: HashMap::new(),
        }
    }

    /// Attach the fetched USD prices for the underlying tokens.
    pub fn attach_prices(&mut self, prices: HashMap<String, f64>) {
        self.prices_usd = prices;
    }
}

/// Highest-TVL pool whose symbol or project contains the query.
pub fn best_match<'a>(pools: &'a [PoolRecord], query: &str) -> Option<&'a PoolRecord> {
    let q = query.to_uppercase();
    pools
        .iter()
        .filter(|p| p.symbol_upper().contains(&q) || p.project_key().to_uppercase().contains(&q))
        .max_by(|a, b| {
            a.tvl()
                .partial_cmp(&b.tvl())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}
