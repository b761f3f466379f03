//! Merge Engine: reconcile a client snapshot with the stored progress
//!
//! The client always wins. Each entry is created when unknown or
//! overwritten when present; a differing mastery_level or repetitions count
//! is reported as a conflict. The batch, its stats update and the audit
//! event commit as one transaction.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{debug, info, warn};
use wordmate_common::db::{begin_write, retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use wordmate_common::{time, Error, Result};

use crate::db::events::{self, EventType};
use crate::db::{accounts, progress};
use crate::models::{
    ConflictValue, EntryError, ProgressRecord, Resolution, SyncBatch, SyncConflict, SyncOutcome,
    WordProgress,
};
use crate::services::stats_aggregator;

/// What happened to one merged entry
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    Created,
    Updated(Option<SyncConflict>),
}

/// Merge Engine
pub struct MergeEngine {
    db: Pool<Sqlite>,
}

impl MergeEngine {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Merge `batch` into the account's progress at the current time
    pub async fn sync(&self, user_id: &str, batch: &SyncBatch) -> Result<SyncOutcome> {
        self.sync_at(user_id, batch, time::now()).await
    }

    /// Merge `batch` as of `now`
    ///
    /// Entries rejected at the boundary, or by a constraint while writing,
    /// are reported in `skipped`. Any other failure rolls back the batch.
    pub async fn sync_at(
        &self,
        user_id: &str,
        batch: &SyncBatch,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        debug!(
            user_id = %user_id,
            entries = batch.submitted,
            "Merging progress batch"
        );

        for rejected in &batch.rejected {
            warn!(
                user_id = %user_id,
                index = rejected.index,
                word_id = ?rejected.word_id,
                reason = %rejected.reason,
                "Skipping invalid progress entry"
            );
        }

        retry_on_lock("progress sync", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.merge_batch(user_id, batch, now)
        })
        .await
    }

    /// One attempt at the batch inside a single write transaction
    async fn merge_batch(
        &self,
        user_id: &str,
        batch: &SyncBatch,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let mut tx = begin_write(&self.db).await?;

        if !accounts::account_exists(&mut *tx, user_id).await? {
            return Err(Error::NotFound(format!("Account {}", user_id)));
        }

        let mut skipped = batch.rejected.clone();
        let mut updated_count = 0;
        let mut conflicts = Vec::new();

        for (index, entry) in &batch.entries {
            match merge_entry(&mut tx, user_id, entry, now).await {
                Ok(MergeAction::Created) => updated_count += 1,
                Ok(MergeAction::Updated(conflict)) => {
                    updated_count += 1;
                    if let Some(conflict) = conflict {
                        debug!(
                            user_id = %user_id,
                            word_id = %conflict.word_id,
                            server_mastery = conflict.server_value.mastery_level,
                            client_mastery = conflict.client_value.mastery_level,
                            "Sync conflict resolved in favour of client"
                        );
                        conflicts.push(conflict);
                    }
                }
                Err(e) if e.is_entry_recoverable() => {
                    warn!(
                        user_id = %user_id,
                        index,
                        word_id = %entry.word_id,
                        error = %e,
                        "Skipping progress entry rejected by the store"
                    );
                    skipped.push(EntryError::new(
                        *index,
                        Some(entry.word_id.clone()),
                        e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        if batch.session_count > 0 {
            debug!(
                user_id = %user_id,
                sessions = batch.session_count,
                "Session summaries in sync payload are not merged"
            );
        }

        if let Some(update) = &batch.stats {
            stats_aggregator::apply_sync_update(&mut tx, user_id, update, now).await?;
        }

        skipped.sort_by_key(|e| e.index);

        events::insert_event(
            &mut tx,
            Some(user_id),
            EventType::Sync,
            &json!({
                "updated_words": updated_count,
                "conflicts": conflicts.len(),
                "skipped": skipped.len(),
                "stats_updated": batch.stats.is_some(),
            }),
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            user_id = %user_id,
            submitted = batch.submitted,
            updated = updated_count,
            conflicts = conflicts.len(),
            skipped = skipped.len(),
            "Progress sync complete"
        );

        Ok(SyncOutcome {
            updated_count,
            conflicts,
            skipped,
            sync_timestamp: now,
        })
    }
}

/// Create or overwrite one record
pub async fn merge_entry(
    conn: &mut SqliteConnection,
    user_id: &str,
    entry: &WordProgress,
    now: DateTime<Utc>,
) -> Result<MergeAction> {
    match progress::load_record(conn, user_id, &entry.word_id).await? {
        None => {
            progress::insert_record(conn, user_id, entry, now).await?;
            Ok(MergeAction::Created)
        }
        Some(existing) => {
            let conflict = entry
                .conflicts_with(&existing)
                .then(|| conflict_between(&existing, entry));
            progress::overwrite_record(conn, user_id, entry, now).await?;
            Ok(MergeAction::Updated(conflict))
        }
    }
}

fn conflict_between(existing: &ProgressRecord, incoming: &WordProgress) -> SyncConflict {
    SyncConflict {
        word_id: incoming.word_id.clone(),
        server_value: ConflictValue {
            mastery_level: existing.mastery_level,
            repetitions: existing.repetitions,
        },
        client_value: ConflictValue {
            mastery_level: incoming.mastery_level,
            repetitions: incoming.repetitions,
        },
        resolution: Resolution::ClientWins,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_pool, seed_account};
    use crate::models::{ProgressPayload, UserStats};
    use chrono::{NaiveDate, TimeZone};
    use serde_json::{json, Value};

    fn batch(words: Vec<Value>, stats: Option<Value>) -> SyncBatch {
        SyncBatch::from_payload(&ProgressPayload {
            words,
            sessions: Vec::new(),
            stats,
        })
    }

    fn merge_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    async fn stored(pool: &Pool<Sqlite>, word_id: &str) -> Option<ProgressRecord> {
        let mut conn = pool.acquire().await.unwrap();
        progress::load_record(&mut conn, "user_1", word_id).await.unwrap()
    }

    async fn stats(pool: &Pool<Sqlite>) -> UserStats {
        let mut conn = pool.acquire().await.unwrap();
        accounts::load_stats(&mut conn, "user_1").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_words_are_created_without_conflict() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        let words = vec![
            json!({"word_id": "apple", "mastery_level": 2.0, "repetitions": 2}),
            json!({"word_id": "pear"}),
        ];
        let outcome = engine
            .sync_at("user_1", &batch(words, None), merge_time())
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 2);
        assert!(outcome.conflicts.is_empty());
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.sync_timestamp, merge_time());

        let pear = stored(&pool, "pear").await.unwrap();
        assert_eq!(pear.ease_factor, 2.5);
        assert_eq!(pear.updated_at, merge_time());
    }

    #[tokio::test]
    async fn test_differing_mastery_is_client_wins_conflict() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        let first = vec![json!({"word_id": "apple", "mastery_level": 2.0, "repetitions": 2})];
        engine
            .sync_at("user_1", &batch(first, None), merge_time())
            .await
            .unwrap();

        let second = vec![json!({
            "word_id": "apple",
            "mastery_level": 3.5,
            "repetitions": 2,
            "ease_factor": 2.9,
            "next_review": "2024-06-05"
        })];
        let outcome = engine
            .sync_at("user_1", &batch(second, None), merge_time())
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 1);
        assert_eq!(
            outcome.conflicts,
            vec![SyncConflict {
                word_id: "apple".to_string(),
                server_value: ConflictValue {
                    mastery_level: 2.0,
                    repetitions: 2
                },
                client_value: ConflictValue {
                    mastery_level: 3.5,
                    repetitions: 2
                },
                resolution: Resolution::ClientWins,
            }]
        );

        let apple = stored(&pool, "apple").await.unwrap();
        assert_eq!(apple.mastery_level, 3.5);
        assert_eq!(apple.ease_factor, 2.9);
        assert_eq!(apple.next_review, NaiveDate::from_ymd_opt(2024, 6, 5));
    }

    #[tokio::test]
    async fn test_matching_batch_has_no_conflicts_even_when_ease_differs() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        let first = vec![json!({"word_id": "apple", "mastery_level": 1.0, "repetitions": 1})];
        engine
            .sync_at("user_1", &batch(first, None), merge_time())
            .await
            .unwrap();

        let second = vec![json!({
            "word_id": "apple",
            "mastery_level": 1.0,
            "repetitions": 1,
            "ease_factor": 1.9,
            "seen_count": 8
        })];
        let outcome = engine
            .sync_at("user_1", &batch(second, None), merge_time())
            .await
            .unwrap();
        assert!(outcome.conflicts.is_empty());
        assert_eq!(stored(&pool, "apple").await.unwrap().seen_count, 8);
    }

    #[tokio::test]
    async fn test_replayed_batch_is_idempotent() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        let words = vec![
            json!({"word_id": "apple", "mastery_level": 2.7, "repetitions": 3, "last_review": "2024-05-30"}),
            json!({"word_id": "pear", "mastery_level": 0.3}),
        ];
        let payload = batch(words, Some(json!({"total_words_learned": 2, "current_streak": 1})));

        engine.sync_at("user_1", &payload, merge_time()).await.unwrap();
        let apple_before = stored(&pool, "apple").await.unwrap();
        let stats_before = stats(&pool).await;

        let replay = engine.sync_at("user_1", &payload, merge_time()).await.unwrap();
        assert!(replay.conflicts.is_empty());
        assert_eq!(replay.updated_count, 2);
        assert_eq!(stored(&pool, "apple").await.unwrap(), apple_before);
        assert_eq!(stats(&pool).await, stats_before);
    }

    #[tokio::test]
    async fn test_invalid_entries_are_skipped_not_fatal() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        let words = vec![
            json!({"word_id": "apple"}),
            json!({"word_id": "bad", "mastery_level": 6.0}),
            json!({"mastery_level": 1.0}),
            json!({"word_id": "late", "last_review": "yesterday"}),
            json!({"word_id": "pear"}),
        ];
        let outcome = engine
            .sync_at("user_1", &batch(words, None), merge_time())
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 2);
        let indices: Vec<usize> = outcome.skipped.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(stored(&pool, "bad").await.is_none());
        assert!(stored(&pool, "pear").await.is_some());
    }

    #[tokio::test]
    async fn test_stats_follow_aggregation_rule() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        sqlx::query("UPDATE users SET current_streak = 1, max_streak = 5 WHERE id = 'user_1'")
            .execute(&pool)
            .await
            .unwrap();
        let engine = MergeEngine::new(pool.clone());

        let payload = batch(
            Vec::new(),
            Some(json!({"total_words_learned": 4, "current_streak": 3, "max_streak": 3, "last_active_date": "2020-01-01"})),
        );
        engine.sync_at("user_1", &payload, merge_time()).await.unwrap();

        let after = stats(&pool).await;
        assert_eq!(after.total_words_learned, 4);
        assert_eq!(after.current_streak, 3);
        assert_eq!(after.max_streak, 5);
        assert_eq!(after.last_active_date, Some(merge_time().date_naive()));
    }

    #[tokio::test]
    async fn test_absent_stats_leave_account_untouched() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        engine
            .sync_at("user_1", &batch(vec![json!({"word_id": "apple"})], Some(json!({}))), merge_time())
            .await
            .unwrap();
        assert_eq!(stats(&pool).await, UserStats::default());
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found_and_writes_nothing() {
        let pool = memory_pool().await;
        let engine = MergeEngine::new(pool.clone());

        let result = engine
            .sync_at("ghost", &batch(vec![json!({"word_id": "apple"})], None), merge_time())
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_words")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_word_in_batch_becomes_update() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        let words = vec![
            json!({"word_id": "apple", "mastery_level": 1.0}),
            json!({"word_id": "apple", "mastery_level": 2.0}),
        ];
        let outcome = engine
            .sync_at("user_1", &batch(words, None), merge_time())
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 2);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(stored(&pool, "apple").await.unwrap().mastery_level, 2.0);
    }

    #[tokio::test]
    async fn test_sync_writes_audit_event() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());

        engine
            .sync_at("user_1", &batch(vec![json!({"word_id": "apple"})], None), merge_time())
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let data = events::load_event_data(&mut conn, "user_1", EventType::Sync)
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["updated_words"], 1);
    }

    #[tokio::test]
    async fn test_failure_after_writes_rolls_back_whole_batch() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let engine = MergeEngine::new(pool.clone());
        engine
            .sync_at(
                "user_1",
                &batch(
                    vec![json!({"word_id": "apple", "mastery_level": 1.0, "repetitions": 1})],
                    Some(json!({"total_words_learned": 1, "current_streak": 1, "max_streak": 1})),
                ),
                merge_time(),
            )
            .await
            .unwrap();
        let apple_before = stored(&pool, "apple").await;
        let stats_before = stats(&pool).await;

        // The audit insert is the last write of a batch
        sqlx::query("DROP TABLE events").execute(&pool).await.unwrap();

        let words = vec![
            json!({"word_id": "apple", "mastery_level": 3.0, "repetitions": 4}),
            json!({"word_id": "pear", "mastery_level": 2.0}),
        ];
        let stats_update = json!({"total_words_learned": 2, "current_streak": 6, "max_streak": 6});
        let result = engine
            .sync_at("user_1", &batch(words, Some(stats_update)), merge_time())
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Database(_)), "unexpected error: {}", err);
        assert!(!err.is_entry_recoverable());
        assert_eq!(stored(&pool, "apple").await, apple_before);
        assert!(stored(&pool, "pear").await.is_none());
        assert_eq!(stats(&pool).await, stats_before);
    }
}
