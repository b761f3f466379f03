//! Progress Store: per-user, per-word progress rows
//!
//! All functions take a connection so they can run inside the caller's
//! transaction (`&mut *tx`) or on a pooled connection.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use wordmate_common::{Error, Result};

use crate::models::{DueWord, ProgressRecord, WordProgress};

const RECORD_COLUMNS: &str = "user_id, word_id, mastery_level, repetitions, ease_factor, \
     last_review, next_review, seen_count, correct_count, updated_at";

/// Load one record by its (user, word) key
pub async fn load_record(
    conn: &mut SqliteConnection,
    user_id: &str,
    word_id: &str,
) -> Result<Option<ProgressRecord>> {
    let query = format!(
        "SELECT {} FROM user_words WHERE user_id = ? AND word_id = ?",
        RECORD_COLUMNS
    );
    let record = sqlx::query_as::<_, ProgressRecord>(&query)
        .bind(user_id)
        .bind(word_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(record)
}

/// Create a record with the given values
///
/// Fails with a uniqueness violation when the key already exists.
pub async fn insert_record(
    conn: &mut SqliteConnection,
    user_id: &str,
    progress: &WordProgress,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_words (
            user_id, word_id, mastery_level, repetitions, ease_factor,
            last_review, next_review, seen_count, correct_count, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&progress.word_id)
    .bind(progress.mastery_level)
    .bind(progress.repetitions)
    .bind(progress.ease_factor)
    .bind(progress.last_review)
    .bind(progress.next_review)
    .bind(progress.seen_count)
    .bind(progress.correct_count)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replace every progress field of an existing record
///
/// Returns false when no record matched.
pub async fn overwrite_record(
    conn: &mut SqliteConnection,
    user_id: &str,
    progress: &WordProgress,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE user_words SET
            mastery_level = ?,
            repetitions = ?,
            ease_factor = ?,
            last_review = ?,
            next_review = ?,
            seen_count = ?,
            correct_count = ?,
            updated_at = ?
        WHERE user_id = ? AND word_id = ?
        "#,
    )
    .bind(progress.mastery_level)
    .bind(progress.repetitions)
    .bind(progress.ease_factor)
    .bind(progress.last_review)
    .bind(progress.next_review)
    .bind(progress.seen_count)
    .bind(progress.correct_count)
    .bind(now)
    .bind(user_id)
    .bind(&progress.word_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert or replace a single record
///
/// Write path for the scoring collaborator after an answered question.
pub async fn upsert_record(
    conn: &mut SqliteConnection,
    user_id: &str,
    progress: &WordProgress,
    now: DateTime<Utc>,
) -> Result<()> {
    progress.validate().map_err(Error::InvalidInput)?;

    sqlx::query(
        r#"
        INSERT INTO user_words (
            user_id, word_id, mastery_level, repetitions, ease_factor,
            last_review, next_review, seen_count, correct_count, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, word_id) DO UPDATE SET
            mastery_level = excluded.mastery_level,
            repetitions = excluded.repetitions,
            ease_factor = excluded.ease_factor,
            last_review = excluded.last_review,
            next_review = excluded.next_review,
            seen_count = excluded.seen_count,
            correct_count = excluded.correct_count,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(&progress.word_id)
    .bind(progress.mastery_level)
    .bind(progress.repetitions)
    .bind(progress.ease_factor)
    .bind(progress.last_review)
    .bind(progress.next_review)
    .bind(progress.seen_count)
    .bind(progress.correct_count)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Every record of a user, ordered by word id
pub async fn load_records_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<ProgressRecord>> {
    let query = format!(
        "SELECT {} FROM user_words WHERE user_id = ? ORDER BY word_id",
        RECORD_COLUMNS
    );
    let records = sqlx::query_as::<_, ProgressRecord>(&query)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(records)
}

/// Words below `mastery_threshold` whose review date is absent or not after `today`
///
/// Lowest mastery first, then least recently reviewed. SQLite sorts NULL
/// before any value in ascending order, so never-reviewed words lead their
/// mastery group.
pub async fn load_due_words(
    conn: &mut SqliteConnection,
    user_id: &str,
    mastery_threshold: f64,
    today: NaiveDate,
    limit: u32,
) -> Result<Vec<DueWord>> {
    let words = sqlx::query_as::<_, DueWord>(
        r#"
        SELECT word_id, mastery_level, last_review, seen_count, repetitions
        FROM user_words
        WHERE user_id = ?
          AND mastery_level < ?
          AND (next_review IS NULL OR next_review <= ?)
        ORDER BY mastery_level ASC, last_review ASC, word_id ASC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(mastery_threshold)
    .bind(today)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await?;

    Ok(words)
}

/// Number of records a user holds
pub async fn count_records(conn: &mut SqliteConnection, user_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_words WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_pool, seed_account};

    fn word(word_id: &str, mastery_level: f64, last_review: Option<(i32, u32, u32)>) -> WordProgress {
        let mut progress = WordProgress::new(word_id);
        progress.mastery_level = mastery_level;
        progress.last_review = last_review.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        progress
    }

    #[tokio::test]
    async fn test_insert_then_load() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let mut conn = pool.acquire().await.unwrap();

        let progress = word("apple", 2.5, Some((2024, 1, 1)));
        insert_record(&mut conn, "user_1", &progress, Utc::now()).await.unwrap();

        let record = load_record(&mut conn, "user_1", "apple").await.unwrap().unwrap();
        assert_eq!(record.progress(), progress);
        assert!(load_record(&mut conn, "user_1", "pear").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_recoverable() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let mut conn = pool.acquire().await.unwrap();

        let progress = WordProgress::new("apple");
        insert_record(&mut conn, "user_1", &progress, Utc::now()).await.unwrap();
        let err = insert_record(&mut conn, "user_1", &progress, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_entry_recoverable());
    }

    #[tokio::test]
    async fn test_overwrite_reports_missing_row() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let mut conn = pool.acquire().await.unwrap();

        let progress = word("apple", 3.0, None);
        assert!(!overwrite_record(&mut conn, "user_1", &progress, Utc::now()).await.unwrap());

        insert_record(&mut conn, "user_1", &WordProgress::new("apple"), Utc::now())
            .await
            .unwrap();
        assert!(overwrite_record(&mut conn, "user_1", &progress, Utc::now()).await.unwrap());

        let record = load_record(&mut conn, "user_1", "apple").await.unwrap().unwrap();
        assert_eq!(record.mastery_level, 3.0);
    }

    #[tokio::test]
    async fn test_upsert_creates_and_replaces() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let mut conn = pool.acquire().await.unwrap();

        upsert_record(&mut conn, "user_1", &word("apple", 1.0, None), Utc::now())
            .await
            .unwrap();
        let mut scored = word("apple", 1.5, Some((2024, 3, 1)));
        scored.repetitions = 1;
        scored.next_review = NaiveDate::from_ymd_opt(2024, 3, 2);
        upsert_record(&mut conn, "user_1", &scored, Utc::now()).await.unwrap();

        let record = load_record(&mut conn, "user_1", "apple").await.unwrap().unwrap();
        assert_eq!(record.progress(), scored);
        assert_eq!(count_records(&mut conn, "user_1").await.unwrap(), 1);

        let invalid = word("apple", 7.0, None);
        let err = upsert_record(&mut conn, "user_1", &invalid, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_due_words_filter_and_order() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let mut conn = pool.acquire().await.unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let mut future = word("future", 0.5, None);
        future.next_review = NaiveDate::from_ymd_opt(2024, 6, 2);
        let mut due_today = word("due_today", 2.0, Some((2024, 5, 1)));
        due_today.next_review = Some(today);

        for progress in [
            word("b", 1.0, Some((2024, 2, 1))),
            word("a", 1.0, Some((2024, 1, 1))),
            word("never", 1.0, None),
            word("mastered", 4.0, None),
            future,
            due_today,
            word("low", 0.0, Some((2024, 5, 30))),
        ] {
            insert_record(&mut conn, "user_1", &progress, Utc::now()).await.unwrap();
        }

        let due = load_due_words(&mut conn, "user_1", 4.0, today, 20).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, vec!["low", "never", "a", "b", "due_today"]);

        let limited = load_due_words(&mut conn, "user_1", 4.0, today, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
