//! Practice session summaries

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use wordmate_common::{Error, Result};

use crate::models::{PracticeType, SessionRecord, SessionSummary};

pub async fn insert_session(
    conn: &mut SqliteConnection,
    user_id: &str,
    session: &SessionSummary,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (
            user_id, practice_type, words_count, correct_count,
            accuracy, duration_seconds, started_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(session.practice_type.as_str())
    .bind(session.words_count)
    .bind(session.correct_count)
    .bind(session.accuracy)
    .bind(session.duration_seconds)
    .bind(session.started_at)
    .bind(session.completed_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Sessions started at or after `since`, newest first
///
/// Sessions without a start time are never returned.
pub async fn load_sessions_since(
    conn: &mut SqliteConnection,
    user_id: &str,
    since: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<SessionRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, practice_type, words_count, correct_count, accuracy,
               duration_seconds, started_at, completed_at
        FROM sessions
        WHERE user_id = ? AND started_at >= ?
        ORDER BY started_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(since)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<SessionRecord> {
            let practice_type: String = row.try_get("practice_type")?;
            let practice_type = PracticeType::parse(&practice_type).ok_or_else(|| {
                Error::Internal(format!("Unknown practice type: {}", practice_type))
            })?;

            Ok(SessionRecord {
                id: row.try_get("id")?,
                practice_type,
                words_count: row.try_get("words_count")?,
                correct_count: row.try_get("correct_count")?,
                accuracy: row.try_get("accuracy")?,
                duration_seconds: row.try_get("duration_seconds")?,
                started_at: row.try_get("started_at")?,
                completed_at: row.try_get("completed_at")?,
            })
        })
        .collect()
}

pub async fn count_sessions(conn: &mut SqliteConnection, user_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}
