use super::{now_text, parse_ts, Store, StoreResult};
use crate::{realized_pnl, Side};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// One trade in the journal, opened by hand or by the auto trader
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub action: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<String>,
    pub pnl: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_open: bool,
    pub notes: Option<String>,
    pub ai_confidence: Option<f64>,
    pub ai_reason: Option<String>,
    pub strategy_used: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewJournalEntry {
    #[serde(default)]
    pub user_id: i64,
    pub symbol: String,
    pub action: Side,
    pub quantity: f64,
    pub entry_price: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub ai_confidence: Option<f64>,
    #[serde(default)]
    pub ai_reason: Option<String>,
    #[serde(default)]
    pub strategy_used: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalSummary {
    pub total_trades: i64,
    pub open_trades: i64,
    pub closed_trades: i64,
    pub winning_trades: i64,
    pub win_rate: f64,
    pub total_pnl: f64,
}

const JOURNAL_COLUMNS: &str = "id, user_id, symbol, action, quantity, entry_price, stop_loss, \
     take_profit, exit_price, exit_reason, pnl, pnl_percentage, opened_at, closed_at, is_open, \
     notes, ai_confidence, ai_reason, strategy_used, order_id";

fn side_from_column(idx: usize, text: &str) -> rusqlite::Result<Side> {
    text.parse::<Side>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<JournalEntry> {
    let action: String = row.get(3)?;
    let opened: String = row.get(12)?;
    let closed: Option<String> = row.get(13)?;

    Ok(JournalEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        action: side_from_column(3, &action)?,
        quantity: row.get(4)?,
        entry_price: row.get(5)?,
        stop_loss: row.get(6)?,
        take_profit: row.get(7)?,
        exit_price: row.get(8)?,
        exit_reason: row.get(9)?,
        pnl: row.get(10)?,
        pnl_percentage: row.get(11)?,
        opened_at: parse_ts(12, &opened)?,
        closed_at: closed.as_deref().map(|t| parse_ts(13, t)).transpose()?,
        is_open: row.get(14)?,
        notes: row.get(15)?,
        ai_confidence: row.get(16)?,
        ai_reason: row.get(17)?,
        strategy_used: row.get(18)?,
        order_id: row.get(19)?,
    })
}

impl Store {
    pub fn open_journal_entry(&self, entry: &NewJournalEntry) -> StoreResult<JournalEntry> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trading_journal (
                user_id, symbol, action, quantity, entry_price, stop_loss, take_profit,
                opened_at, is_open, notes, ai_confidence, ai_reason, strategy_used, order_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?11, ?12, ?13)",
            params![
                entry.user_id,
                entry.symbol,
                entry.action.as_str(),
                entry.quantity,
                entry.entry_price,
                entry.stop_loss,
                entry.take_profit,
                now_text(),
                entry.notes,
                entry.ai_confidence,
                entry.ai_reason,
                entry.strategy_used,
                entry.order_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let saved = conn.query_row(
            &format!("SELECT {} FROM trading_journal WHERE id = ?1", JOURNAL_COLUMNS),
            params![id],
            entry_from_row,
        )?;
        Ok(saved)
    }

    /// Close an open trade and book its P&L; `None` if it is missing, foreign or already closed
    pub fn close_journal_entry(
        &self,
        id: i64,
        user_id: i64,
        exit_price: f64,
        exit_reason: &str,
    ) -> StoreResult<Option<JournalEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let open = tx
            .query_row(
                &format!(
                    "SELECT {} FROM trading_journal WHERE id = ?1 AND user_id = ?2 AND is_open = 1",
                    JOURNAL_COLUMNS
                ),
                params![id, user_id],
                entry_from_row,
            )
            .optional()?;
        let Some(open) = open else {
            return Ok(None);
        };

        let (pnl, pnl_pct) = realized_pnl(open.action, open.entry_price, exit_price, open.quantity);
        tx.execute(
            "UPDATE trading_journal
             SET exit_price = ?1, exit_reason = ?2, pnl = ?3, pnl_percentage = ?4,
                 closed_at = ?5, is_open = 0
             WHERE id = ?6",
            params![exit_price, exit_reason, pnl, pnl_pct, now_text(), id],
        )?;
        let closed = tx.query_row(
            &format!("SELECT {} FROM trading_journal WHERE id = ?1", JOURNAL_COLUMNS),
            params![id],
            entry_from_row,
        )?;
        tx.commit()?;
        Ok(Some(closed))
    }

    pub fn list_journal(&self, user_id: i64, open_only: bool) -> StoreResult<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let sql = if open_only {
            format!(
                "SELECT {} FROM trading_journal WHERE user_id = ?1 AND is_open = 1 ORDER BY id DESC",
                JOURNAL_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM trading_journal WHERE user_id = ?1 ORDER BY id DESC",
                JOURNAL_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn journal_entry(&self, id: i64, user_id: i64) -> StoreResult<Option<JournalEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM trading_journal WHERE id = ?1 AND user_id = ?2",
                    JOURNAL_COLUMNS
                ),
                params![id, user_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn journal_summary(&self, user_id: i64) -> StoreResult<JournalSummary> {
        let conn = self.conn()?;
        let (total, open, winning, total_pnl): (i64, i64, i64, f64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN is_open = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_open = 0 AND pnl > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_open = 0 THEN pnl ELSE 0 END), 0.0)
             FROM trading_journal WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let closed = total - open;
        let win_rate = if closed > 0 {
            winning as f64 / closed as f64 * 100.0
        } else {
            0.0
        };

        Ok(JournalSummary {
            total_trades: total,
            open_trades: open,
            closed_trades: closed,
            winning_trades: winning,
            win_rate,
            total_pnl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewUser;
    use approx::assert_relative_eq;

    fn setup() -> (Store, i64) {
        let store = Store::in_memory().unwrap();
        let user = store
            .create_user(&NewUser {
                email: "journal@example.com".into(),
                hashed_password: "x".into(),
                full_name: None,
            })
            .unwrap();
        (store, user.id)
    }

    fn trade(user_id: i64, action: Side, entry: f64) -> NewJournalEntry {
        NewJournalEntry {
            user_id,
            symbol: "BTCUSDT".into(),
            action,
            quantity: 0.5,
            entry_price: entry,
            stop_loss: Some(entry * 0.98),
            take_profit: Some(entry * 1.04),
            strategy_used: Some("trend_following".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_and_close_long() {
        let (store, uid) = setup();
        let opened = store.open_journal_entry(&trade(uid, Side::Buy, 100.0)).unwrap();
        assert!(opened.is_open);
        assert!(opened.pnl.is_none());

        let closed = store
            .close_journal_entry(opened.id, uid, 110.0, "take_profit")
            .unwrap()
            .unwrap();
        assert!(!closed.is_open);
        assert_relative_eq!(closed.pnl.unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(closed.pnl_percentage.unwrap(), 10.0, epsilon = 1e-9);
        assert_eq!(closed.exit_reason.as_deref(), Some("take_profit"));
        assert!(closed.closed_at.is_some());
    }

    #[test]
    fn test_close_short_is_side_aware() {
        let (store, uid) = setup();
        let opened = store.open_journal_entry(&trade(uid, Side::Sell, 100.0)).unwrap();
        let closed = store
            .close_journal_entry(opened.id, uid, 90.0, "manual")
            .unwrap()
            .unwrap();
        assert_relative_eq!(closed.pnl.unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_close_twice_or_foreign_returns_none() {
        let (store, uid) = setup();
        let opened = store.open_journal_entry(&trade(uid, Side::Buy, 100.0)).unwrap();
        assert!(store.close_journal_entry(opened.id, uid + 1, 101.0, "x").unwrap().is_none());
        assert!(store.close_journal_entry(opened.id, uid, 101.0, "x").unwrap().is_some());
        assert!(store.close_journal_entry(opened.id, uid, 102.0, "x").unwrap().is_none());
        assert!(store.close_journal_entry(999, uid, 102.0, "x").unwrap().is_none());
    }

    #[test]
    fn test_list_and_summary() {
        let (store, uid) = setup();
        let a = store.open_journal_entry(&trade(uid, Side::Buy, 100.0)).unwrap();
        let b = store.open_journal_entry(&trade(uid, Side::Buy, 100.0)).unwrap();
        store.open_journal_entry(&trade(uid, Side::Buy, 100.0)).unwrap();

        store.close_journal_entry(a.id, uid, 120.0, "tp").unwrap();
        store.close_journal_entry(b.id, uid, 90.0, "sl").unwrap();

        assert_eq!(store.list_journal(uid, false).unwrap().len(), 3);
        assert_eq!(store.list_journal(uid, true).unwrap().len(), 1);

        let summary = store.journal_summary(uid).unwrap();
        assert_eq!(summary.total_trades, 3);
        assert_eq!(summary.open_trades, 1);
        assert_eq!(summary.closed_trades, 2);
        assert_eq!(summary.winning_trades, 1);
        assert_relative_eq!(summary.win_rate, 50.0);
        assert_relative_eq!(summary.total_pnl, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let (store, uid) = setup();
        let summary = store.journal_summary(uid).unwrap();
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.total_pnl, 0.0);
    }

    #[test]
    fn test_entry_lookup_scoped_to_user() {
        let (store, uid) = setup();
        let opened = store.open_journal_entry(&trade(uid, Side::Buy, 100.0)).unwrap();
        assert!(store.journal_entry(opened.id, uid).unwrap().is_some());
        assert!(store.journal_entry(opened.id, uid + 7).unwrap().is_none());
    }
}
