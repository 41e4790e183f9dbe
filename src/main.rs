//! Yieldscout - risk-adjusted DeFi pool recommendations
//!
//! Run with: cargo run -- recommend --amount 100 --horizon 6 --risk moderate

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::str::FromStr;
use std::time::Instant;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yieldscout::llama::{best_match, LpView};
use yieldscout::ranking::{prepare_universe, CandidateSelector};
use yieldscout::types::{RecommendReport, RecommendRequest, ScoredPool};
use yieldscout::{Config, LlamaClient, Narrator, PoolRecord, RiskTolerance};

#[derive(Parser)]
#[command(name = "yieldscout", version, about = "Risk-adjusted yield pool recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Recommend pools for a principal, horizon and risk tolerance
    Recommend(RecommendArgs),

    /// Show the best-matching pool for a symbol/project query
    Lookup(LookupArgs),
}

#[derive(Args)]
struct RecommendArgs {
    /// Amount to allocate, in units of the reference asset
    #[arg(long, default_value_t = 100.0)]
    amount: f64,

    /// Investment horizon in months
    #[arg(long, default_value_t = 6)]
    horizon: u32,

    /// Risk tolerance: conservative, moderate or aggressive
    #[arg(long, default_value = "moderate")]
    risk: String,

    /// Target chain (overrides CHAIN)
    #[arg(long)]
    chain: Option<String>,

    /// Restrict the universe to one project
    #[arg(long)]
    project: Option<String>,

    /// Widen the universe with a symbol substring search
    #[arg(long)]
    search: Option<String>,

    /// Number of recommendations (overrides TOP_N)
    #[arg(long)]
    top: Option<usize>,

    /// Universe-size cap (overrides FETCH_LIMIT)
    #[arg(long)]
    limit: Option<usize>,

    /// Generate a narrative paragraph per recommendation
    #[arg(long)]
    narrative: bool,

    /// Emit the full report as JSON instead of the styled summary
    #[arg(long)]
    json: bool,
}

impl Default for RecommendArgs {
    fn default() -> Self {
        Self {
            amount: 100.0,
            horizon: 6,
            risk: "moderate".to_string(),
            chain: None,
            project: None,
            search: None,
            top: None,
            limit: None,
            narrative: false,
            json: false,
        }
    }
}

#[derive(Args)]
struct LookupArgs {
    /// Symbol or project substring to match
    #[arg(long)]
    query: String,

    /// Target chain (overrides CHAIN)
    #[arg(long)]
    chain: Option<String>,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔭 YIELDSCOUT - Risk-Adjusted Pool Recommendations").cyan().bold()
    );
    println!(
        "{}",
        style("    DeFiLlama universe | TOPSIS ranking | TVL-floor relaxation").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("yieldscout=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    match cli.command.unwrap_or(Command::Recommend(RecommendArgs::default())) {
        Command::Recommend(args) => run_recommend(config, args).await,
        Command::Lookup(args) => run_lookup(config, args).await,
    }
}

async fn run_recommend(config: Config, args: RecommendArgs) -> Result<()> {
    let request = RecommendRequest {
        principal: args.amount,
        horizon_months: args.horizon,
        risk: RiskTolerance::from_str(&args.risk)?,
        chain: args.chain.unwrap_or_else(|| config.chain.clone()),
        top_n: args.top.unwrap_or(config.top_n),
        max_universe: args.limit.unwrap_or(config.fetch_limit),
    };
    request.validate()?;

    if !args.json {
        print_banner();
        config.print_summary();
        println!();
    }

    let client = LlamaClient::new(
        &config.llama_yields_url,
        &config.llama_prices_url,
        config.llama_timeout_secs,
        &config.user_agent,
    )?;

    // =============================================
    // PHASE 1: UNIVERSE
    // =============================================
    if !args.json {
        println!("{}", style("═══ PHASE 1: UNIVERSE ═══").blue().bold());
        println!();
        println!("{}", style("Step 1.1: Fetching pool universe...").blue());
    }
    let start = Instant::now();

    let chain = Some(request.chain.as_str());
    let project = args.project.as_deref();
    let pools = if let Some(ref query) = args.search {
        // A symbol search widens the universe with a second, query-scoped
        // fetch; duplicates collapse in prepare_universe.
        let (main_set, broad_set) = futures::join!(
            client.fetch_pools(chain, project, None),
            client.fetch_pools(chain, None, Some(query)),
        );
        let mut pools = main_set?;
        pools.extend(broad_set?);
        pools
    } else {
        client.fetch_pools(chain, project, None).await?
    };

    let universe = prepare_universe(pools, request.max_universe);
    if !args.json {
        println!(
            "{} {} candidate pools in {:?}",
            style("✓").green(),
            universe.len(),
            start.elapsed()
        );
    }

    // =============================================
    // PHASE 2: SCORING & RANKING
    // =============================================
    if !args.json {
        println!();
        println!("{}", style("═══ PHASE 2: SCORING & RANKING ═══").magenta().bold());
        println!();
    }
    let start = Instant::now();

    let selector = CandidateSelector::new(request.risk, &request.chain, request.top_n);
    let outcome = selector.select(&universe, request.principal, request.horizon_months);

    if !args.json {
        println!(
            "{} Selected {} of {} pools in {:?} ({} relaxation level{}, floor ${:.0})",
            style("✓").green(),
            outcome.results.len(),
            universe.len(),
            start.elapsed(),
            outcome.levels_run,
            if outcome.levels_run == 1 { "" } else { "s" },
            outcome.tvl_floor_used,
        );
    }

    if outcome.results.is_empty() {
        warn!("no pools matched even at the fully relaxed TVL floor");
    }

    // =============================================
    // PHASE 3: PRICING & NARRATIVES
    // =============================================
    let mut results = outcome.results;

    let ref_price = client
        .reference_price(&request.chain, &config.ref_token_addr)
        .await;
    for row in &mut results {
        row.attach_usd(ref_price);
    }
    if !args.json {
        match ref_price {
            Some(p) => println!(
                "{} {} price: ${:.2}",
                style("✓").green(),
                config.ref_token_symbol,
                p
            ),
            None => println!(
                "{} No USD price for {}; profits stay native",
                style("○").yellow(),
                config.ref_token_symbol
            ),
        }
    }

    let want_narratives = args.narrative || config.include_narrative_default;
    let narrator = Narrator::new(
        config.openai_api_key.clone(),
        &config.openai_model,
        &config.ref_token_symbol,
        config.llama_timeout_secs,
    )?;
    let explanations = if want_narratives && narrator.is_enabled() {
        narrator.explain_all(&results, &request).await
    } else {
        if want_narratives && !args.json {
            println!(
                "{} Narratives requested but OPENAI_API_KEY is not set",
                style("○").yellow()
            );
        }
        Vec::new()
    };

    let report = RecommendReport {
        inputs: request,
        universe_count: universe.len(),
        tvl_floor_used: outcome.tvl_floor_used,
        top_n: results,
        explanations,
        generated_at: chrono::Utc::now(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&config, &report);
    }
    Ok(())
}

fn print_report(config: &Config, report: &RecommendReport) {
    println!();
    println!("{}", style("═══ RECOMMENDATIONS ═══").green().bold());

    for (i, row) in report.top_n.iter().enumerate() {
        println!();
        println!(
            "{} {}",
            style(format!("#{}", i + 1)).green().bold(),
            style(format_pool_title(row)).bold()
        );
        println!(
            "   Style: {}  |  Exposure: {}  |  TVL: ${:.0}",
            row.why.style,
            row.exposure.as_deref().unwrap_or("?"),
            row.tvl_usd
        );
        println!(
            "   APY now: {:.2}%  ->  net estimate: {:.2}%  (IL penalty: {:.2} pct pts)",
            row.apy_now, row.apy_net_estimate, row.why.il_penalty_pct_pts
        );
        println!(
            "   Period return ({} mo): {:.2}%  |  Downside: {:.3}  |  RAR: {:.2}",
            row.horizon_months, row.period_return_pct, row.downside_period, row.rar
        );
        match row.profit_usd {
            Some(usd) => println!(
                "   Projected profit: {:.4} {} (~${:.2})",
                row.profit, config.ref_token_symbol, usd
            ),
            None => println!(
                "   Projected profit: {:.4} {}",
                row.profit, config.ref_token_symbol
            ),
        }
        if let Some(cc) = row.topsis_score {
            println!(
                "   Composite score: {:.1}  |  TOPSIS closeness: {:.4}",
                row.score, cc
            );
        }
        if let Some(url) = &row.url {
            println!("   {}", style(url).dim());
        }
    }

    for narrative in &report.explanations {
        println!();
        println!(
            "{} {}",
            style("📝").green(),
            style(narrative.symbol.as_deref().unwrap_or("?")).bold()
        );
        println!("{}", narrative.text);
    }

    println!();
    println!(
        "{} Universe: {} pools  |  TVL floor used: ${:.0}  |  Generated: {}",
        style("✓").green(),
        report.universe_count,
        report.tvl_floor_used,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn format_pool_title(row: &ScoredPool) -> String {
    format!(
        "{} / {}",
        row.project.as_deref().unwrap_or("?"),
        row.symbol.as_deref().unwrap_or("?")
    )
}

async fn run_lookup(config: Config, args: LookupArgs) -> Result<()> {
    let client = LlamaClient::new(
        &config.llama_yields_url,
        &config.llama_prices_url,
        config.llama_timeout_secs,
        &config.user_agent,
    )?;

    let chain = args.chain.unwrap_or_else(|| config.chain.clone());
    let pools: Vec<PoolRecord> = client.fetch_pools(Some(&chain), None, None).await?;

    let Some(found) = best_match(&pools, &args.query) else {
        return Err(eyre!("no pool on {chain} matches '{}'", args.query));
    };

    let mut view = LpView::from_record(found);
    if !view.underlying_tokens.is_empty() {
        let prices = client.fetch_prices(&chain, &view.underlying_tokens).await?;
        view.attach_prices(prices);
    }
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
