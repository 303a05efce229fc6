//! DeepSignal backend - main entry point
//!
//! This binary provides three subcommands:
//! - serve: Run the HTTP API (auth, keys, market data, analysis, auto trading)
//! - analyze: One-shot strategy analysis on live or fallback candles
//! - strategies: List registered strategies

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "deep-signal")]
#[command(
    about = "Crypto signal backend with exchange access, strategies and auto trading",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = deep_signal::config::DEFAULT_CONFIG_PATH)]
        config: String,

        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Never call Binance: fallback market data and paper fills
        #[arg(long)]
        offline: bool,
    },

    /// Analyze a symbol with one strategy
    Analyze {
        /// Trading pair, e.g. BTCUSDT
        symbol: String,

        /// Path to configuration file
        #[arg(short, long, default_value = deep_signal::config::DEFAULT_CONFIG_PATH)]
        config: String,

        /// Strategy name (defaults to trading.default_strategy)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Kline interval
        #[arg(short, long, default_value = "1h")]
        interval: String,

        /// Number of candles
        #[arg(short, long, default_value = "100")]
        limit: u32,

        /// Strategy parameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Use fallback candles instead of Binance
        #[arg(long)]
        offline: bool,
    },

    /// List available strategies
    Strategies,
}

fn setup_logging(verbose: bool, json: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn,tower_http=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true)
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
    });

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Serve { .. } => "serve",
        Commands::Analyze { .. } => "analyze",
        Commands::Strategies => "strategies",
    };

    setup_logging(cli.verbose, cli.json_logs, command_name)?;

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            offline,
        } => commands::serve::run(config, host, port, offline),

        Commands::Analyze {
            symbol,
            config,
            strategy,
            interval,
            limit,
            params,
            offline,
        } => commands::analyze::run(commands::analyze::AnalyzeArgs {
            symbol,
            config,
            strategy,
            interval,
            limit,
            params,
            offline,
        }),

        Commands::Strategies => commands::strategies::run(),
    }
}
