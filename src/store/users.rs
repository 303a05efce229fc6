use super::{is_unique_violation, now_text, parse_ts, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
}

const USER_COLUMNS: &str = "id, email, hashed_password, full_name, is_active, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        hashed_password: row.get(2)?,
        full_name: row.get(3)?,
        is_active: row.get(4)?,
        created_at: parse_ts(5, &created)?,
    })
}

impl Store {
    /// Insert a user; emails are unique case-insensitively
    pub fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let conn = self.conn()?;
        let email = new.email.trim().to_lowercase();

        conn.execute(
            "INSERT INTO users (email, hashed_password, full_name, is_active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![email, new.hashed_password, new.full_name, now_text()],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("user {}", email))
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email.trim()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn count_users(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            hashed_password: "$2b$04$hash".to_string(),
            full_name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn test_create_and_find_user() {
        let store = Store::in_memory().unwrap();
        let user = store.create_user(&new_user("Ada@Example.com")).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(user.is_active);

        let by_email = store.find_user_by_email("ADA@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = store.find_user(user.id).unwrap().unwrap();
        assert_eq!(by_id.full_name.as_deref(), Some("Ada"));
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = Store::in_memory().unwrap();
        store.create_user(&new_user("bob@example.com")).unwrap();
        let err = store.create_user(&new_user("BOB@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn test_missing_user_is_none() {
        let store = Store::in_memory().unwrap();
        assert!(store.find_user(42).unwrap().is_none());
        assert!(store.find_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let store = Store::in_memory().unwrap();
        let user = store.create_user(&new_user("carol@example.com")).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["email"], "carol@example.com");
    }
}
