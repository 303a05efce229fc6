//! HTTP API server command

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use deep_signal::api::{self, AppState};
use deep_signal::config::AppConfig;
use deep_signal::exchange::{BinanceConnector, ExchangeConnector, OfflineConnector};
use deep_signal::store::Store;
use deep_signal::vault::Vault;

pub fn run(
    config_path: String,
    host: Option<String>,
    port: Option<u16>,
    offline: bool,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, host, port, offline))
}

/// Pick the connector the config asks for
pub fn build_connector(config: &AppConfig) -> Result<Arc<dyn ExchangeConnector>> {
    let trading = &config.trading;
    if config.exchange.offline {
        info!("Offline mode: fallback market data with paper fills");
        return Ok(Arc::new(OfflineConnector::new(
            &trading.paper_quote_asset,
            trading.paper_starting_balance,
        )));
    }

    let binance = config.exchange.binance_config();
    info!(base_url = %binance.base_url, "Using Binance");
    let mut connector =
        BinanceConnector::new(binance).context("Failed to build Binance client")?;
    if trading.paper_trading {
        info!(
            quote = %trading.paper_quote_asset,
            balance = trading.paper_starting_balance,
            "Paper trading enabled"
        );
        connector = connector
            .with_paper_trading(&trading.paper_quote_asset, trading.paper_starting_balance);
    } else {
        warn!("LIVE TRADING MODE - orders use each user's stored exchange keys");
    }
    Ok(Arc::new(connector))
}

async fn run_async(
    config_path: String,
    host: Option<String>,
    port: Option<u16>,
    offline: bool,
) -> Result<()> {
    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if offline {
        config.exchange.offline = true;
    }
    config.validate()?;

    let store = Store::open(&config.database.path).with_context(|| {
        format!("Failed to open database {}", config.database.path.display())
    })?;
    let vault = Vault::from_config(config.vault.encryption_key.as_deref());
    let connector = build_connector(&config)?;

    let addr = config.bind_address();
    let state = AppState::new(config, store, connector, vault);
    let app = api::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("DeepSignal API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    state.bots.stop_all().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating shutdown..."),
        Err(e) => error!("Error setting up signal handler: {}", e),
    }
}
