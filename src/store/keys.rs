use super::{now_text, parse_ts, Store, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

/// Stored exchange credentials; `api_key`/`secret_key` hold vault ciphertext
#[derive(Debug, Clone)]
pub struct ExchangeKeyRecord {
    pub id: i64,
    pub user_id: i64,
    pub exchange_name: String,
    pub api_key: String,
    pub secret_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

const KEY_COLUMNS: &str = "id, user_id, exchange_name, api_key, secret_key, is_active, created_at";

fn key_from_row(row: &Row<'_>) -> rusqlite::Result<ExchangeKeyRecord> {
    let created: String = row.get(6)?;
    Ok(ExchangeKeyRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        exchange_name: row.get(2)?,
        api_key: row.get(3)?,
        secret_key: row.get(4)?,
        is_active: row.get(5)?,
        created_at: parse_ts(6, &created)?,
    })
}

impl Store {
    /// Save a key pair; any previously active pair for the same exchange is deactivated
    pub fn insert_exchange_key(
        &self,
        user_id: i64,
        exchange_name: &str,
        api_key: &str,
        secret_key: &str,
    ) -> StoreResult<ExchangeKeyRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE exchange_keys SET is_active = 0 WHERE user_id = ?1 AND exchange_name = ?2",
            params![user_id, exchange_name],
        )?;
        tx.execute(
            "INSERT INTO exchange_keys (user_id, exchange_name, api_key, secret_key, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![user_id, exchange_name, api_key, secret_key, now_text()],
        )?;
        let id = tx.last_insert_rowid();
        let record = tx.query_row(
            &format!("SELECT {} FROM exchange_keys WHERE id = ?1", KEY_COLUMNS),
            params![id],
            key_from_row,
        )?;
        tx.commit()?;
        Ok(record)
    }

    pub fn list_exchange_keys(&self, user_id: i64) -> StoreResult<Vec<ExchangeKeyRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exchange_keys WHERE user_id = ?1 ORDER BY id DESC",
            KEY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id], key_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn active_exchange_key(
        &self,
        user_id: i64,
        exchange_name: &str,
    ) -> StoreResult<Option<ExchangeKeyRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM exchange_keys
                     WHERE user_id = ?1 AND exchange_name = ?2 AND is_active = 1
                     ORDER BY id DESC LIMIT 1",
                    KEY_COLUMNS
                ),
                params![user_id, exchange_name],
                key_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Returns false when the key does not exist or belongs to another user
    pub fn delete_exchange_key(&self, id: i64, user_id: i64) -> StoreResult<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "DELETE FROM exchange_keys WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(affected > 0)
    }
}
