//! advisor-cli: run the recommendation pipeline for one questionnaire and
//! print the ranked table.
//!
//! Usage:
//!   cargo run -p advisor-cli -- --risk 4 --horizon 3 --goal 4 --market 3 --loss 2 --theme 2
//!   cargo run -p advisor-cli -- --top 10 --peers data/peer_preferences.csv
//!   cargo run -p advisor-cli -- --cache-dir /tmp/advisor-cache

use advisor_core::UserProfile;
use advisor_pipeline::RecommendationPipeline;
use market_data::{MarketDataGateway, SnapshotCache, YahooChartProvider};
use recommender::{PeerPreferences, DEFAULT_TOP_N};
use std::sync::Arc;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn arg_u8(args: &[String], flag: &str, default: u8) -> u8 {
    arg_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "advisor_cli=info,advisor_pipeline=info,market_data=info,recommender=info".into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let profile = UserProfile {
        risk_tolerance: arg_u8(&args, "--risk", 3),
        investment_horizon: arg_u8(&args, "--horizon", 3),
        goal: arg_u8(&args, "--goal", 3),
        market_preference: arg_u8(&args, "--market", 3),
        experience: arg_u8(&args, "--experience", 2),
        loss_aversion: arg_u8(&args, "--loss", 3),
        theme_preference: arg_u8(&args, "--theme", 1),
    };
    profile.validate()?;

    let top_n: usize = arg_value(&args, "--top")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TOP_N);

    let cache_dir = arg_value(&args, "--cache-dir")
        .or_else(|| std::env::var("ETF_ADVISOR_CACHE_DIR").ok())
        .unwrap_or_else(|| "cache".to_string());

    let peers = match arg_value(&args, "--peers") {
        Some(path) => PeerPreferences::from_csv_path(path),
        None => PeerPreferences::default(),
    };

    let provider = Arc::new(YahooChartProvider::new()?);
    let gateway = MarketDataGateway::new(provider, SnapshotCache::new(&cache_dir));
    let pipeline = RecommendationPipeline::new(gateway).with_peers(peers);

    let snapshot = pipeline.load_market_snapshot(&profile).await?;
    tracing::info!(
        "Snapshot ready: {} instruments ({} failed), risk-free rate {:.2}%",
        snapshot.metrics.len(),
        snapshot.failed_tickers.len(),
        snapshot.risk_free_rate * 100.0
    );

    let recommendation = pipeline.recommend(&profile, &snapshot, top_n)?;

    println!("\n{}\n", recommendation.cluster_explanation);
    println!(
        "{:<8} | {:<34} | {:<12} | {:>3} | {:>8} | {:>8} | {:>7} | {:>8} | {:>7} | {:>6}",
        "Ticker", "Name", "Category", "Mkt", "Ret 1Y%", "Vol%", "Sharpe", "MaxDD%", "Sortino", "Score"
    );
    println!("{}", "-".repeat(126));
    for row in &recommendation.rows {
        println!(
            "{:<8} | {:<34} | {:<12} | {:>3} | {:>8.2} | {:>8.2} | {:>7.2} | {:>8.2} | {:>7.2} | {:>6.3}",
            row.ticker,
            row.name,
            row.category,
            row.market.code(),
            row.return_1y,
            row.volatility,
            row.sharpe_ratio,
            row.max_drawdown,
            row.sortino_ratio,
            row.recommendation_score
        );
    }

    Ok(())
}
