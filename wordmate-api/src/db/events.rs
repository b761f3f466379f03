//! Audit log

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqliteConnection;
use wordmate_common::Result;

/// Kinds of audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    AnonymousTrial,
    Registration,
    Login,
    Payment,
    Session,
    Sync,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AnonymousTrial => "anonymous_trial",
            EventType::Registration => "registration",
            EventType::Login => "login",
            EventType::Payment => "payment",
            EventType::Session => "session",
            EventType::Sync => "sync",
            EventType::Error => "error",
        }
    }
}

/// Append one event; `data` is stored as JSON text
pub async fn insert_event(
    conn: &mut SqliteConnection,
    user_id: Option<&str>,
    event_type: EventType,
    data: &Value,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO events (user_id, event_type, event_data, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(event_type.as_str())
    .bind(data.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Event data of a user's events of one type, oldest first
pub async fn load_event_data(
    conn: &mut SqliteConnection,
    user_id: &str,
    event_type: EventType,
) -> Result<Vec<Value>> {
    let rows: Vec<Option<String>> = sqlx::query_scalar(
        "SELECT event_data FROM events WHERE user_id = ? AND event_type = ? ORDER BY id",
    )
    .bind(user_id)
    .bind(event_type.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|data| {
            data.and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or(Value::Null)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_pool, seed_account};
    use serde_json::json;

    #[tokio::test]
    async fn test_event_roundtrip() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let mut conn = pool.acquire().await.unwrap();

        insert_event(&mut conn, Some("user_1"), EventType::Login, &json!({"via": "email"}), Utc::now())
            .await
            .unwrap();
        insert_event(&mut conn, None, EventType::Error, &json!({}), Utc::now())
            .await
            .unwrap();

        let logins = load_event_data(&mut conn, "user_1", EventType::Login).await.unwrap();
        assert_eq!(logins, vec![json!({"via": "email"})]);
        assert!(load_event_data(&mut conn, "user_1", EventType::Sync)
            .await
            .unwrap()
            .is_empty());
    }
}
