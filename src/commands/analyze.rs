//! One-shot analysis command

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use deep_signal::config::AppConfig;
use deep_signal::exchange::{BinanceClient, Exchange, FallbackExchange, MarketService};
use deep_signal::indicators::snapshot;
use deep_signal::normalize_symbol;
use deep_signal::strategies::create_strategy_with;

pub struct AnalyzeArgs {
    pub symbol: String,
    pub config: String,
    pub strategy: Option<String>,
    pub interval: String,
    pub limit: u32,
    pub params: Option<String>,
    pub offline: bool,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(args))
}

async fn run_async(args: AnalyzeArgs) -> Result<()> {
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let symbol = normalize_symbol(&args.symbol)
        .ok_or_else(|| anyhow!("Invalid symbol '{}'", args.symbol))?;
    let strategy_name = args
        .strategy
        .unwrap_or_else(|| config.trading.default_strategy.clone());
    let params: serde_json::Value = match &args.params {
        Some(raw) => serde_json::from_str(raw).context("--params must be a JSON object")?,
        None => serde_json::Value::Null,
    };
    let strategy = create_strategy_with(&strategy_name, &params)?;

    let primary: Arc<dyn Exchange> = if args.offline || config.exchange.offline {
        Arc::new(FallbackExchange::new())
    } else {
        Arc::new(BinanceClient::new(config.exchange.binance_config())?)
    };
    let market = MarketService::new(primary, config.exchange.fallback_enabled);

    let candles = market
        .klines(&symbol, &args.interval, args.limit)
        .await
        .with_context(|| format!("Failed to fetch {} {} candles", symbol, args.interval))?;
    let analysis = strategy.analyze(&candles.data);

    println!("\n{}", "=".repeat(60));
    println!(
        "{} {} ({} candles, source: {})",
        symbol,
        args.interval,
        candles.data.len(),
        candles.source
    );
    println!("Strategy: {}", strategy.name());
    println!("{}", "=".repeat(60));
    println!("Action:      {}", analysis.action);
    println!("Confidence:  {:.2}", analysis.confidence);
    println!("Reason:      {}", analysis.reason);
    println!("Entry:       {:.4}", analysis.entry_price);
    println!("Stop loss:   {:.4}", analysis.stop_loss);
    println!("Take profit: {:.4}", analysis.take_profit);

    let indicators = snapshot(&candles.data);
    if !indicators.is_empty() {
        println!("\nIndicators:");
        for (name, value) in &indicators {
            println!("  {:<16} {:.4}", name, value);
        }
    }
    println!();
    Ok(())
}
