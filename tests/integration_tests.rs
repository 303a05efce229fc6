//! Integration tests for the deep-signal system
//!
//! These tests verify that strategies, paper accounts and the auto trader
//! work together correctly.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use deep_signal::bot::{AutoTrader, BotManager, BotSettings, CycleOutcome, JournalSink, TradeKind};
use deep_signal::exchange::{Exchange, ExchangeError, ExchangeResult, PaperExchange};
use deep_signal::indicators;
use deep_signal::store::{NewUser, Store};
use deep_signal::strategies::{available_strategies, create_strategy, create_strategy_with};
use deep_signal::{
    Action, Balance, Candle, DataSource, ExchangeInfo, OrderAck, ServerTime, Side, Ticker24h,
    TickerPrice,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle {
            datetime: start + Duration::minutes(15 * i as i64),
            open: c,
            high: c * 1.001,
            low: c * 0.999,
            close: c,
            volume: 1000.0 + i as f64,
        })
        .collect()
}

/// Generate trending candle data (for testing trend-following strategies)
fn trending_closes(count: usize, base_price: f64, trend_strength: f64) -> Vec<f64> {
    (0..count)
        .map(|i| base_price + i as f64 * trend_strength)
        .collect()
}

/// Market data feed whose closes the test controls; no order support of its own
struct ScriptedFeed {
    closes: Mutex<Vec<f64>>,
}

impl ScriptedFeed {
    fn new(closes: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            closes: Mutex::new(closes),
        })
    }

    fn last(&self) -> f64 {
        *self.closes.lock().unwrap().last().unwrap_or(&0.0)
    }

    fn set_last(&self, price: f64) {
        if let Some(last) = self.closes.lock().unwrap().last_mut() {
            *last = price;
        }
    }
}

#[async_trait]
impl Exchange for ScriptedFeed {
    fn source(&self) -> DataSource {
        DataSource::Binance
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<TickerPrice> {
        Ok(TickerPrice {
            symbol: symbol.to_string(),
            price: self.last(),
        })
    }

    async fn all_prices(&self) -> ExchangeResult<Vec<TickerPrice>> {
        Ok(vec![self.ticker_price("BTCUSDT").await?])
    }

    async fn ticker_24h(&self, _symbol: &str) -> ExchangeResult<Ticker24h> {
        Err(ExchangeError::Unsupported("24h ticker".into()))
    }

    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        Err(ExchangeError::Unsupported("exchange info".into()))
    }

    async fn server_time(&self) -> ExchangeResult<ServerTime> {
        Ok(ServerTime {
            server_time: Utc::now().timestamp_millis(),
        })
    }

    async fn klines(
        &self,
        _symbol: &str,
        _interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        let closes = self.closes.lock().unwrap().clone();
        let skip = closes.len().saturating_sub(limit as usize);
        Ok(candles_from_closes(&closes[skip..]))
    }

    async fn balances(&self) -> ExchangeResult<Vec<Balance>> {
        Err(ExchangeError::MissingCredentials)
    }

    async fn place_market_order(
        &self,
        _symbol: &str,
        _side: Side,
        _quantity: f64,
    ) -> ExchangeResult<OrderAck> {
        Err(ExchangeError::Unsupported("orders".into()))
    }
}

fn bot_settings() -> BotSettings {
    BotSettings {
        symbol: "BTCUSDT".to_string(),
        quantity: 0.5,
        kline_limit: 60,
        ..BotSettings::default()
    }
}

// =============================================================================
// Strategy Tests
// =============================================================================

#[test]
fn test_every_strategy_handles_short_history() {
    let candles = candles_from_closes(&[100.0, 101.0, 102.0]);
    for info in available_strategies() {
        let strategy = create_strategy(&info.name).unwrap();
        let analysis = strategy.analyze(&candles);
        assert_eq!(analysis.action, Action::Hold, "{}", info.name);
        assert_eq!(analysis.confidence, 0.0, "{}", info.name);
        assert_eq!(analysis.strategy, info.name);
    }
}

#[test]
fn test_every_strategy_handles_empty_input() {
    for info in available_strategies() {
        let analysis = create_strategy(&info.name).unwrap().analyze(&[]);
        assert_eq!(analysis.action, Action::Hold);
        assert_eq!(analysis.entry_price, 0.0);
    }
}

#[test]
fn test_registry_lists_all_strategies_sorted() {
    let names: Vec<String> = available_strategies()
        .into_iter()
        .map(|i| i.name.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "bollinger_breakout",
            "breakout",
            "mean_reversion",
            "rsi_momentum",
            "sma_crossover",
            "trend_following",
        ]
    );
    assert!(create_strategy("does_not_exist").is_err());
}

#[test]
fn test_trend_following_up_and_down() {
    let strategy = create_strategy("trend_following").unwrap();

    let up = strategy.analyze(&candles_from_closes(&trending_closes(60, 100.0, 1.0)));
    assert_eq!(up.action, Action::Buy);
    assert!((up.confidence - 0.8).abs() < 1e-9);
    assert!((up.stop_loss - up.entry_price * 0.98).abs() < 1e-6);

    let down = strategy.analyze(&candles_from_closes(&trending_closes(60, 200.0, -1.0)));
    assert_eq!(down.action, Action::Sell);
    assert!((down.confidence - 0.7).abs() < 1e-9);
}

#[test]
fn test_mean_reversion_after_selloff() {
    let strategy = create_strategy("mean_reversion").unwrap();
    let analysis = strategy.analyze(&candles_from_closes(&trending_closes(30, 200.0, -3.0)));
    assert_eq!(analysis.action, Action::Buy);
    assert!(analysis.indicators["rsi"] < 30.0);
}

#[test]
fn test_flat_market_holds_everywhere() {
    let candles = candles_from_closes(&vec![100.0; 80]);
    for name in ["trend_following", "sma_crossover"] {
        let analysis = create_strategy(name).unwrap().analyze(&candles);
        assert_eq!(analysis.action, Action::Hold, "{}", name);
    }
}

#[test]
fn test_strategy_params_override_defaults() {
    let params = serde_json::json!({ "buy_confidence": 0.9, "take_profit_factor": 1.10 });
    let strategy = create_strategy_with("trend_following", &params).unwrap();
    let analysis = strategy.analyze(&candles_from_closes(&trending_closes(60, 100.0, 1.0)));

    assert_eq!(analysis.action, Action::Buy);
    assert!((analysis.confidence - 0.9).abs() < 1e-9);
    assert!((analysis.take_profit - analysis.entry_price * 1.10).abs() < 1e-6);
    // Untouched fields keep their defaults
    assert!((analysis.stop_loss - analysis.entry_price * 0.98).abs() < 1e-6);

    let bad = serde_json::json!({ "fast_period": "twenty" });
    assert!(create_strategy_with("trend_following", &bad).is_err());
}

#[test]
fn test_indicator_snapshot_keys() {
    let candles = candles_from_closes(&trending_closes(60, 100.0, 0.5));
    let snapshot = indicators::snapshot(&candles);
    for key in ["sma_20", "sma_50", "ema_12", "ema_26", "rsi_14", "bb_upper", "bb_lower"] {
        assert!(snapshot.contains_key(key), "missing {}", key);
    }
    assert!(snapshot["bb_upper"] > snapshot["bb_lower"]);
}

// =============================================================================
// Auto Trader Tests
// =============================================================================

#[tokio::test]
async fn test_paper_round_trip_through_auto_trader() {
    let feed = ScriptedFeed::new(trending_closes(60, 100.0, 1.0));
    let account = Arc::new(PaperExchange::new(feed.clone(), "USDT", 1_000.0).with_fee_rate(0.0));

    let store = Store::in_memory().unwrap();
    let user = store
        .create_user(&NewUser {
            email: "trader@example.com".into(),
            hashed_password: "x".into(),
            full_name: None,
        })
        .unwrap();

    let mut trader = AutoTrader::new(
        account.clone(),
        create_strategy("trend_following").unwrap(),
        bot_settings(),
    )
    .with_journal(JournalSink {
        store: store.clone(),
        user_id: user.id,
    });

    // Entry at 159
    assert_eq!(trader.run_cycle().await.unwrap(), CycleOutcome::Entered(Side::Buy));
    assert!((account.balance_of("BTC") - 0.5).abs() < 1e-9);
    assert!((account.balance_of("USDT") - (1_000.0 - 0.5 * 159.0)).abs() < 1e-9);

    // Take profit at +5%
    feed.set_last(159.0 * 1.05);
    assert_eq!(
        trader.run_cycle().await.unwrap(),
        CycleOutcome::Exited("take_profit")
    );
    assert!(account.balance_of("BTC").abs() < 1e-9);

    let stats = trader.stats();
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.winning_trades, 1);
    assert!((stats.total_pnl - 0.5 * 159.0 * 0.05).abs() < 1e-6);

    let kinds: Vec<TradeKind> = stats.recent.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![TradeKind::Entry, TradeKind::Exit]);

    let summary = store.journal_summary(user.id).unwrap();
    assert_eq!(summary.closed_trades, 1);
    assert!((summary.total_pnl - stats.total_pnl).abs() < 1e-6);
}

#[tokio::test]
async fn test_insufficient_paper_balance_is_logged() {
    let feed = ScriptedFeed::new(trending_closes(60, 100.0, 1.0));
    let account = Arc::new(PaperExchange::new(feed, "USDT", 10.0));

    let mut trader = AutoTrader::new(
        account,
        create_strategy("trend_following").unwrap(),
        bot_settings(),
    );
    assert_eq!(trader.run_cycle().await.unwrap(), CycleOutcome::OrderFailed);
    assert!(trader.positions().is_empty());
    let last = trader.trade_log().last().unwrap();
    assert_eq!(last.kind, TradeKind::Failed);
    assert!(last.reason.contains("Insufficient"));
}

#[tokio::test]
async fn test_confidence_must_exceed_threshold() {
    let feed = ScriptedFeed::new(trending_closes(60, 100.0, 1.0));
    let account = Arc::new(PaperExchange::new(feed, "USDT", 1_000.0));
    let settings = BotSettings {
        // trend_following BUY confidence is exactly 0.8
        min_confidence: 0.8,
        ..bot_settings()
    };

    let mut trader =
        AutoTrader::new(account, create_strategy("trend_following").unwrap(), settings);
    assert_eq!(trader.run_cycle().await.unwrap(), CycleOutcome::Idle);
}

#[tokio::test]
async fn test_manager_runs_cycles_until_stopped() {
    let feed = ScriptedFeed::new(trending_closes(60, 100.0, 1.0));
    let account = Arc::new(PaperExchange::new(feed, "USDT", 1_000.0));
    let trader = AutoTrader::new(
        account,
        create_strategy("trend_following").unwrap(),
        BotSettings {
            poll_interval_secs: 1,
            ..bot_settings()
        },
    );

    let manager = BotManager::new();
    manager.start(7, trader).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let status = manager.status(7).await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.active_positions, 1);
    assert_eq!(status.positions[0].side, Side::Buy);
    assert!(status.last_analysis.is_some());

    let stopped = manager.stop(7).await.unwrap();
    assert!(!stopped.is_running);
    assert_eq!(stopped.current_strategy, "trend_following");
}
