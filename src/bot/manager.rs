use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info, warn};

use super::trader::AutoTrader;
use super::types::BotStatus;
use super::BotError;
use crate::strategies::create_strategy;

/// Time allowed for a loop to notice shutdown before it is aborted
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest status of one bot, republished after every cycle
type StatusFeed = Arc<watch::Sender<BotStatus>>;

struct BotHandle {
    trader: Arc<Mutex<AutoTrader>>,
    status: StatusFeed,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    stopping: bool,
}

impl BotHandle {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn is_busy(&self) -> bool {
        self.stopping || self.is_running()
    }

    fn status(&self) -> BotStatus {
        let mut status = self.status.borrow().clone();
        status.is_running = self.is_running();
        status
    }

    /// Detach the loop so it can be halted without holding the manager lock
    fn begin_stop(&mut self) -> (Option<watch::Sender<bool>>, Option<JoinHandle<()>>) {
        self.stopping = true;
        (self.shutdown.take(), self.task.take())
    }
}

#[derive(Default)]
struct Bots {
    handles: HashMap<i64, BotHandle>,
    /// Strategy chosen while no bot was running
    preferred: HashMap<i64, String>,
}

/// One auto-trading loop per user
pub struct BotManager {
    bots: Mutex<Bots>,
    stop_timeout: Duration,
}

impl Default for BotManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BotManager {
    pub fn new() -> Self {
        Self::with_stop_timeout(STOP_TIMEOUT)
    }

    pub fn with_stop_timeout(stop_timeout: Duration) -> Self {
        Self {
            bots: Mutex::new(Bots::default()),
            stop_timeout,
        }
    }

    /// Spawn the polling loop for `user_id`
    pub async fn start(&self, user_id: i64, mut trader: AutoTrader) -> Result<BotStatus, BotError> {
        let mut bots = self.bots.lock().await;
        if bots.handles.get(&user_id).is_some_and(|h| h.is_busy()) {
            return Err(BotError::AlreadyRunning);
        }

        let poll = trader.settings().poll_interval();
        info!(
            user_id,
            symbol = %trader.settings().symbol,
            strategy = trader.strategy_name(),
            poll_secs = poll.as_secs(),
            "Starting auto trading"
        );

        let (tx, rx) = watch::channel(false);
        trader.set_stop_signal(rx.clone());
        let status = trader.status(true);
        let (feed, _) = watch::channel(status.clone());
        let feed = Arc::new(feed);
        let trader = Arc::new(Mutex::new(trader));
        let task = tokio::spawn(run_loop(user_id, trader.clone(), feed.clone(), poll, rx));

        bots.preferred.remove(&user_id);
        bots.handles.insert(
            user_id,
            BotHandle {
                trader,
                status: feed,
                shutdown: Some(tx),
                task: Some(task),
                stopping: false,
            },
        );
        Ok(status)
    }

    /// Signal the loop and wait for it; the stopped bot's state stays queryable
    pub async fn stop(&self, user_id: i64) -> Result<BotStatus, BotError> {
        let (shutdown, task) = {
            let mut bots = self.bots.lock().await;
            let handle = bots
                .handles
                .get_mut(&user_id)
                .filter(|h| h.is_running())
                .ok_or(BotError::NotRunning)?;
            handle.begin_stop()
        };

        halt(user_id, shutdown, task, self.stop_timeout).await;
        info!(user_id, "Auto trading stopped");

        let mut bots = self.bots.lock().await;
        let handle = bots.handles.get_mut(&user_id).ok_or(BotError::NotRunning)?;
        handle.stopping = false;
        Ok(handle.status())
    }

    /// Last published status; never waits for a cycle in flight
    pub async fn status(&self, user_id: i64) -> Option<BotStatus> {
        let bots = self.bots.lock().await;
        bots.handles.get(&user_id).map(BotHandle::status)
    }

    pub async fn is_running(&self, user_id: i64) -> bool {
        let bots = self.bots.lock().await;
        bots.handles.get(&user_id).is_some_and(|h| h.is_running())
    }

    /// Validate `name` and swap it into the user's bot, or remember it for the next start
    pub async fn set_strategy(&self, user_id: i64, name: &str) -> Result<String, BotError> {
        let strategy = create_strategy(name).map_err(|e| BotError::UnknownStrategy(e.to_string()))?;
        let applied = strategy.name().to_string();

        let live = {
            let mut bots = self.bots.lock().await;
            let live = bots
                .handles
                .get(&user_id)
                .filter(|h| h.is_running())
                .map(|h| (h.trader.clone(), h.status.clone()));
            if live.is_none() {
                bots.preferred.insert(user_id, applied.clone());
            }
            live
        };

        // Waits for this user's cycle in flight only
        if let Some((trader, feed)) = live {
            let mut trader = trader.lock().await;
            trader.set_strategy(strategy);
            feed.send_replace(trader.status(true));
        }
        Ok(applied)
    }

    /// Strategy recorded by [`set_strategy`](Self::set_strategy) while idle
    pub async fn preferred_strategy(&self, user_id: i64) -> Option<String> {
        self.bots.lock().await.preferred.get(&user_id).cloned()
    }

    pub async fn running_count(&self) -> usize {
        let bots = self.bots.lock().await;
        bots.handles.values().filter(|h| h.is_running()).count()
    }

    /// Stop every running loop (server shutdown)
    pub async fn stop_all(&self) {
        let mut bots = self.bots.lock().await;
        let stopping: Vec<_> = bots
            .handles
            .iter_mut()
            .filter(|(_, h)| h.is_running())
            .map(|(user_id, h)| (*user_id, h.begin_stop()))
            .collect();
        drop(bots);

        let mut stopped = Vec::with_capacity(stopping.len());
        for (user_id, (shutdown, task)) in stopping {
            halt(user_id, shutdown, task, self.stop_timeout).await;
            stopped.push(user_id);
        }

        let mut bots = self.bots.lock().await;
        for user_id in stopped {
            if let Some(handle) = bots.handles.get_mut(&user_id) {
                handle.stopping = false;
            }
        }
        info!("All auto-trading bots stopped");
    }
}

async fn halt(
    user_id: i64,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    stop_timeout: Duration,
) {
    if let Some(tx) = shutdown {
        let _ = tx.send(true);
    }
    let Some(mut task) = task else {
        return;
    };
    match timeout(stop_timeout, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(user_id, error = %e, "Bot task ended abnormally"),
        Err(_) => {
            warn!(user_id, "Bot did not stop in time, aborting loop");
            task.abort();
        }
    }
}

async fn run_loop(
    user_id: i64,
    trader: Arc<Mutex<AutoTrader>>,
    feed: StatusFeed,
    poll: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Cycles run in their own task: aborting the loop never cuts an order short
                let cycle = tokio::spawn(run_cycle(user_id, trader.clone(), feed.clone()));
                if let Err(e) = cycle.await {
                    error!(user_id, error = %e, "Trading cycle panicked");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(user_id, "Trading loop exited");
}

async fn run_cycle(user_id: i64, trader: Arc<Mutex<AutoTrader>>, feed: StatusFeed) {
    let mut trader = trader.lock().await;
    if let Err(e) = trader.run_cycle().await {
        error!(user_id, error = %e, "Trading cycle error");
        trader.record_error(&e);
    }
    feed.send_replace(trader.status(true));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::BotSettings;
    use crate::exchange::{Exchange, ExchangeError, ExchangeResult, FallbackExchange};
    use crate::strategies::test_support::candles_from_closes;
    use crate::{
        Balance, Candle, DataSource, ExchangeInfo, OrderAck, ServerTime, Side, Ticker24h,
        TickerPrice,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Uptrend feed whose klines and fills take a while
    struct SlowExchange {
        kline_delay: Duration,
        fill_delay: Duration,
        orders_sent: AtomicUsize,
    }

    impl SlowExchange {
        fn new(kline_delay: Duration, fill_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kline_delay,
                fill_delay,
                orders_sent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Exchange for SlowExchange {
        fn source(&self) -> DataSource {
            DataSource::Binance
        }
        async fn ticker_price(&self, symbol: &str) -> ExchangeResult<TickerPrice> {
            Ok(TickerPrice {
                symbol: symbol.to_string(),
                price: 159.0,
            })
        }
        async fn all_prices(&self) -> ExchangeResult<Vec<TickerPrice>> {
            Ok(vec![])
        }
        async fn ticker_24h(&self, _symbol: &str) -> ExchangeResult<Ticker24h> {
            Err(ExchangeError::Unsupported("ticker".into()))
        }
        async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
            Err(ExchangeError::Unsupported("info".into()))
        }
        async fn server_time(&self) -> ExchangeResult<ServerTime> {
            Ok(ServerTime { server_time: 0 })
        }
        async fn klines(&self, _s: &str, _i: &str, _l: u32) -> ExchangeResult<Vec<Candle>> {
            tokio::time::sleep(self.kline_delay).await;
            let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
            Ok(candles_from_closes(&closes))
        }
        async fn balances(&self) -> ExchangeResult<Vec<Balance>> {
            Ok(vec![])
        }
        async fn place_market_order(
            &self,
            symbol: &str,
            side: Side,
            quantity: f64,
        ) -> ExchangeResult<OrderAck> {
            let n = self.orders_sent.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.fill_delay).await;
            Ok(OrderAck {
                order_id: format!("S-{}", n),
                symbol: symbol.to_string(),
                side,
                status: "FILLED".into(),
                executed_qty: quantity,
                avg_price: 159.0,
                transact_time: 0,
            })
        }
    }

    fn slow_trader(exchange: Arc<SlowExchange>) -> AutoTrader {
        let settings = BotSettings {
            poll_interval_secs: 60,
            kline_limit: 60,
            ..BotSettings::default()
        };
        AutoTrader::new(exchange, create_strategy("trend_following").unwrap(), settings)
    }

    fn trader() -> AutoTrader {
        let settings = BotSettings {
            poll_interval_secs: 1,
            ..BotSettings::default()
        };
        AutoTrader::new(
            Arc::new(FallbackExchange::new()),
            create_strategy("trend_following").unwrap(),
            settings,
        )
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let manager = BotManager::new();
        assert!(manager.status(1).await.is_none());

        let status = manager.start(1, trader()).await.unwrap();
        assert!(status.is_running);
        assert!(manager.is_running(1).await);
        assert!(matches!(
            manager.start(1, trader()).await,
            Err(BotError::AlreadyRunning)
        ));

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = manager.status(1).await.unwrap();
        assert!(status.cycles >= 1);

        let stopped = manager.stop(1).await.unwrap();
        assert!(!stopped.is_running);
        assert!(!manager.is_running(1).await);
        assert!(matches!(manager.stop(1).await, Err(BotError::NotRunning)));

        // Restart after stop is allowed
        manager.start(1, trader()).await.unwrap();
        manager.stop_all().await;
        assert_eq!(manager.running_count().await, 0);
    }

    #[tokio::test]
    async fn test_bots_are_per_user() {
        let manager = BotManager::new();
        manager.start(1, trader()).await.unwrap();
        manager.start(2, trader()).await.unwrap();
        assert_eq!(manager.running_count().await, 2);

        manager.stop(1).await.unwrap();
        assert!(manager.is_running(2).await);
        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_set_strategy_live_and_idle() {
        let manager = BotManager::new();
        assert!(matches!(
            manager.set_strategy(1, "astrology").await,
            Err(BotError::UnknownStrategy(_))
        ));

        manager.set_strategy(1, "mean_reversion").await.unwrap();
        assert_eq!(manager.preferred_strategy(1).await.as_deref(), Some("mean_reversion"));

        manager.start(1, trader()).await.unwrap();
        manager.set_strategy(1, "breakout").await.unwrap();
        let status = manager.status(1).await.unwrap();
        assert_eq!(status.current_strategy, "breakout");
        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_slow_cycle_does_not_block_other_users() {
        let manager = BotManager::with_stop_timeout(Duration::from_millis(100));
        let slow = SlowExchange::new(Duration::from_secs(3), Duration::ZERO);
        manager.start(1, slow_trader(slow)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let quick = Duration::from_millis(500);
        let status = timeout(quick, manager.status(1)).await.unwrap().unwrap();
        assert!(status.is_running);
        assert_eq!(status.cycles, 0);
        assert!(!timeout(quick, manager.is_running(2)).await.unwrap());
        timeout(quick, manager.start(2, trader())).await.unwrap().unwrap();
        assert!(timeout(quick, manager.status(2)).await.unwrap().is_some());

        manager.stop_all().await;
        assert_eq!(manager.running_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_keeps_order_in_flight() {
        let manager = BotManager::with_stop_timeout(Duration::from_millis(100));
        let exchange = SlowExchange::new(Duration::ZERO, Duration::from_millis(800));
        manager.start(1, slow_trader(exchange.clone())).await.unwrap();

        // Entry order is sent on the first tick and is still waiting for its fill
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(exchange.orders_sent.load(Ordering::SeqCst), 1);

        let stopped = manager.stop(1).await.unwrap();
        assert!(!stopped.is_running);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let status = manager.status(1).await.unwrap();
        assert!(!status.is_running);
        assert_eq!(status.active_positions, 1);
        assert_eq!(status.positions[0].order_id, "S-1");
        assert_eq!(status.stats.recent.len(), 1);
        assert_eq!(exchange.orders_sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_rejected_while_stopping() {
        let manager = Arc::new(BotManager::with_stop_timeout(Duration::from_millis(300)));
        let exchange = SlowExchange::new(Duration::from_secs(2), Duration::ZERO);
        manager.start(1, slow_trader(exchange)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopper = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.stop(1).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            manager.start(1, trader()).await,
            Err(BotError::AlreadyRunning)
        ));

        stopper.await.unwrap().unwrap();
        manager.start(1, trader()).await.unwrap();
        manager.stop_all().await;
    }
}
