use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::types::{BotPosition, BotSettings, BotStatus, TradeKind, TradeLogEntry, TradingStats};
use super::BotError;
use crate::exchange::Exchange;
use crate::store::{NewJournalEntry, Store};
use crate::strategies::Strategy;
use crate::{realized_pnl, Analysis, OrderAck, Side};

/// Number of log entries reported in [`TradingStats::recent`]
const RECENT_TRADES: usize = 10;

/// Where filled trades are journaled
#[derive(Debug, Clone)]
pub struct JournalSink {
    pub store: Store,
    pub user_id: i64,
}

/// What a single cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    NoData,
    Holding,
    Idle,
    Entered(Side),
    Exited(&'static str),
    OrderFailed,
}

pub struct AutoTrader {
    exchange: Arc<dyn Exchange>,
    strategy: Box<dyn Strategy>,
    settings: BotSettings,
    journal: Option<JournalSink>,
    stop_signal: Option<watch::Receiver<bool>>,
    positions: Vec<BotPosition>,
    trade_log: VecDeque<TradeLogEntry>,
    closed_trades: u64,
    winning_trades: u64,
    total_pnl: f64,
    cycles: u64,
    last_cycle_at: Option<chrono::DateTime<Utc>>,
    last_analysis: Option<Analysis>,
    last_error: Option<String>,
}

impl AutoTrader {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        strategy: Box<dyn Strategy>,
        settings: BotSettings,
    ) -> Self {
        Self {
            exchange,
            strategy,
            settings,
            journal: None,
            stop_signal: None,
            positions: Vec::new(),
            trade_log: VecDeque::new(),
            closed_trades: 0,
            winning_trades: 0,
            total_pnl: 0.0,
            cycles: 0,
            last_cycle_at: None,
            last_analysis: None,
            last_error: None,
        }
    }

    pub fn with_journal(mut self, sink: JournalSink) -> Self {
        self.journal = Some(sink);
        self
    }

    /// Once `true` is published on `signal`, no new positions are opened
    pub fn set_stop_signal(&mut self, signal: watch::Receiver<bool>) {
        self.stop_signal = Some(signal);
    }

    fn stop_requested(&self) -> bool {
        self.stop_signal.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Swap the strategy; open positions keep their levels
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        info!(from = self.strategy.name(), to = strategy.name(), "Strategy changed");
        self.strategy = strategy;
    }

    pub fn positions(&self) -> &[BotPosition] {
        &self.positions
    }

    pub fn trade_log(&self) -> impl Iterator<Item = &TradeLogEntry> {
        self.trade_log.iter()
    }

    pub fn record_error(&mut self, err: &BotError) {
        self.last_error = Some(err.to_string());
    }

    /// One polling cycle
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, BotError> {
        self.cycles += 1;
        self.last_cycle_at = Some(Utc::now());
        let symbol = self.settings.symbol.clone();

        let candles = self
            .exchange
            .klines(&symbol, &self.settings.interval, self.settings.kline_limit)
            .await?;
        let Some(price) = candles.last().map(|c| c.close) else {
            warn!(symbol = %symbol, "No candles returned, skipping cycle");
            return Ok(CycleOutcome::NoData);
        };
        self.last_error = None;

        if let Some(idx) = self.positions.iter().position(|p| p.symbol == symbol) {
            if let Some(reason) = self.exit_reason(&self.positions[idx], price) {
                return Ok(self.exit_position(idx, price, reason).await);
            }
        }

        let analysis = self.strategy.analyze(&candles);
        debug!(
            cycle = self.cycles,
            symbol = %symbol,
            action = %analysis.action,
            confidence = analysis.confidence,
            reason = %analysis.reason,
            "Analysis"
        );
        self.last_analysis = Some(analysis.clone());

        if self.positions.iter().any(|p| p.symbol == symbol) {
            return Ok(CycleOutcome::Holding);
        }

        match analysis.action.side() {
            Some(side) if analysis.confidence > self.settings.min_confidence => {
                Ok(self.enter_position(side, price, &analysis).await)
            }
            _ => Ok(CycleOutcome::Idle),
        }
    }

    fn exit_reason(&self, position: &BotPosition, price: f64) -> Option<&'static str> {
        if let Some(reason) = position.exit_trigger(price) {
            return Some(reason);
        }
        let (_, pnl_pct) =
            realized_pnl(position.side, position.entry_price, price, position.quantity);
        if pnl_pct < -self.settings.forced_exit_pct {
            return Some("forced_exit");
        }
        None
    }

    async fn enter_position(
        &mut self,
        side: Side,
        price: f64,
        analysis: &Analysis,
    ) -> CycleOutcome {
        let symbol = self.settings.symbol.clone();
        let quantity = self.settings.quantity;
        if self.stop_requested() {
            info!(symbol = %symbol, side = %side, "Stop requested, entry skipped");
            return CycleOutcome::Idle;
        }

        let ack = match self.exchange.place_market_order(&symbol, side, quantity).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(symbol = %symbol, side = %side, error = %e, "Entry order failed");
                self.push_log(TradeLogEntry {
                    timestamp: Utc::now(),
                    kind: TradeKind::Failed,
                    symbol,
                    side,
                    quantity,
                    price,
                    reason: e.to_string(),
                    strategy: self.strategy.name().to_string(),
                    order_id: None,
                    confidence: Some(analysis.confidence),
                    pnl: None,
                    pnl_percentage: None,
                });
                return CycleOutcome::OrderFailed;
            }
        };

        let entry_price = fill_price(&ack, price);
        let (stop_loss, take_profit) =
            protective_levels(side, analysis.stop_loss, analysis.take_profit);
        let quantity = if ack.executed_qty > 0.0 { ack.executed_qty } else { quantity };

        let journal_id = self.journal.as_ref().and_then(|sink| {
            let entry = NewJournalEntry {
                user_id: sink.user_id,
                symbol: symbol.clone(),
                action: side,
                quantity,
                entry_price,
                stop_loss: Some(stop_loss),
                take_profit: Some(take_profit),
                notes: Some("auto trading".to_string()),
                ai_confidence: Some(analysis.confidence),
                ai_reason: Some(analysis.reason.clone()),
                strategy_used: Some(self.strategy.name().to_string()),
                order_id: Some(ack.order_id.clone()),
            };
            match sink.store.open_journal_entry(&entry) {
                Ok(saved) => Some(saved.id),
                Err(e) => {
                    warn!(error = %e, "Failed to journal entry");
                    None
                }
            }
        });

        info!(
            symbol = %symbol,
            side = %side,
            quantity,
            price = entry_price,
            stop_loss,
            take_profit,
            order_id = %ack.order_id,
            confidence = analysis.confidence,
            "Position opened"
        );

        self.positions.push(BotPosition {
            symbol: symbol.clone(),
            side,
            quantity,
            entry_price,
            stop_loss,
            take_profit,
            entry_time: Utc::now(),
            order_id: ack.order_id.clone(),
            journal_id,
        });
        self.push_log(TradeLogEntry {
            timestamp: Utc::now(),
            kind: TradeKind::Entry,
            symbol,
            side,
            quantity,
            price: entry_price,
            reason: analysis.reason.clone(),
            strategy: self.strategy.name().to_string(),
            order_id: Some(ack.order_id),
            confidence: Some(analysis.confidence),
            pnl: None,
            pnl_percentage: None,
        });

        CycleOutcome::Entered(side)
    }

    async fn exit_position(
        &mut self,
        idx: usize,
        price: f64,
        reason: &'static str,
    ) -> CycleOutcome {
        let position = self.positions[idx].clone();
        let side = position.side.opposite();

        let ack = match self
            .exchange
            .place_market_order(&position.symbol, side, position.quantity)
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                error!(symbol = %position.symbol, reason, error = %e, "Exit order failed");
                self.push_log(TradeLogEntry {
                    timestamp: Utc::now(),
                    kind: TradeKind::Failed,
                    symbol: position.symbol.clone(),
                    side,
                    quantity: position.quantity,
                    price,
                    reason: format!("{}: {}", reason, e),
                    strategy: self.strategy.name().to_string(),
                    order_id: None,
                    confidence: None,
                    pnl: None,
                    pnl_percentage: None,
                });
                return CycleOutcome::OrderFailed;
            }
        };

        self.positions.remove(idx);
        let exit_price = fill_price(&ack, price);
        let (pnl, pnl_pct) = realized_pnl(
            position.side,
            position.entry_price,
            exit_price,
            position.quantity,
        );

        self.closed_trades += 1;
        if pnl > 0.0 {
            self.winning_trades += 1;
        }
        self.total_pnl += pnl;

        if let (Some(sink), Some(journal_id)) = (&self.journal, position.journal_id) {
            if let Err(e) = sink
                .store
                .close_journal_entry(journal_id, sink.user_id, exit_price, reason)
            {
                warn!(journal_id, error = %e, "Failed to close journal entry");
            }
        }

        info!(
            symbol = %position.symbol,
            reason,
            entry = position.entry_price,
            exit = exit_price,
            pnl,
            pnl_pct,
            "Position closed"
        );

        self.push_log(TradeLogEntry {
            timestamp: Utc::now(),
            kind: TradeKind::Exit,
            symbol: position.symbol,
            side,
            quantity: position.quantity,
            price: exit_price,
            reason: reason.to_string(),
            strategy: self.strategy.name().to_string(),
            order_id: Some(ack.order_id),
            confidence: None,
            pnl: Some(pnl),
            pnl_percentage: Some(pnl_pct),
        });

        CycleOutcome::Exited(reason)
    }

    fn push_log(&mut self, entry: TradeLogEntry) {
        self.trade_log.push_back(entry);
        while self.trade_log.len() > self.settings.max_trade_log.max(1) {
            self.trade_log.pop_front();
        }
    }

    pub fn stats(&self) -> TradingStats {
        let win_rate = if self.closed_trades > 0 {
            self.winning_trades as f64 / self.closed_trades as f64 * 100.0
        } else {
            0.0
        };
        let skip = self.trade_log.len().saturating_sub(RECENT_TRADES);
        TradingStats {
            total_trades: self.closed_trades,
            winning_trades: self.winning_trades,
            win_rate,
            total_pnl: self.total_pnl,
            recent: self.trade_log.iter().skip(skip).cloned().collect(),
        }
    }

    pub fn status(&self, is_running: bool) -> BotStatus {
        BotStatus {
            is_running,
            current_strategy: self.strategy.name().to_string(),
            symbol: self.settings.symbol.clone(),
            interval: self.settings.interval.clone(),
            quantity: self.settings.quantity,
            active_positions: self.positions.len(),
            positions: self.positions.clone(),
            cycles: self.cycles,
            last_cycle_at: self.last_cycle_at,
            last_analysis: self.last_analysis.clone(),
            last_error: self.last_error.clone(),
            stats: self.stats(),
        }
    }
}

fn fill_price(ack: &OrderAck, fallback: f64) -> f64 {
    if ack.avg_price > 0.0 {
        ack.avg_price
    } else {
        fallback
    }
}

/// Stop on the losing side of entry, target on the winning side
fn protective_levels(side: Side, a: f64, b: f64) -> (f64, f64) {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    match side {
        Side::Buy => (low, high),
        Side::Sell => (high, low),
    }
}
