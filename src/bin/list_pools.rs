//! Raw Universe Dump - prints the candidate pool universe sorted by TVL
//!
//! Run with: cargo run --bin list-pools
//!
//! Useful for eyeballing what the recommendation pipeline will see before
//! any scoring happens: chain filter, id merge, (project, symbol) dedupe
//! and the universe cap, nothing else.

use std::env;

use yieldscout::ranking::prepare_universe;
use yieldscout::{Config, LlamaClient};

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    dotenvy::dotenv().ok();

    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              YIELDSCOUT RAW UNIVERSE DUMP                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let config = Config::from_env()?;
    config.validate()?;

    let chain = env::var("CHAIN").unwrap_or_else(|_| config.chain.clone());
    let limit: usize = env::var("FETCH_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.fetch_limit);

    println!("📡 Chain: {chain}  |  Limit: {limit}");
    println!();

    let client = LlamaClient::new(
        &config.llama_yields_url,
        &config.llama_prices_url,
        config.llama_timeout_secs,
        &config.user_agent,
    )?;

    let pools = client.fetch_pools(Some(&chain), None, None).await?;
    let universe = prepare_universe(pools, limit);

    println!(
        "{:<4} {:<22} {:<28} {:>14} {:>9} {:>9}",
        "#", "PROJECT", "SYMBOL", "TVL (USD)", "APY %", "30D %"
    );
    println!("{}", "─".repeat(92));
    for (i, pool) in universe.iter().enumerate() {
        println!(
            "{:<4} {:<22} {:<28} {:>14.0} {:>9.2} {:>9.2}",
            i + 1,
            truncate(&pool.project_key(), 22),
            truncate(&pool.symbol_upper(), 28),
            pool.tvl(),
            pool.apy_now(),
            pool.apy_mean_30d_or_spot(),
        );
    }

    println!();
    println!("✓ {} pools in the prepared universe", universe.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
