//! Review Selector: due-for-review words in priority order

use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::debug;
use wordmate_common::config::ProgressSettings;
use wordmate_common::{time, Error, Result};

use crate::db::{accounts, progress};
use crate::models::DueWord;

/// Review Selector
///
/// Read-only. Words at or above the mastery threshold, or scheduled after
/// the reference date, are never returned.
pub struct ReviewSelector {
    db: Pool<Sqlite>,
    settings: Arc<ProgressSettings>,
}

impl ReviewSelector {
    pub fn new(db: Pool<Sqlite>, settings: Arc<ProgressSettings>) -> Self {
        Self { db, settings }
    }

    /// Due words as of today; `limit` is capped by `max_review_limit`
    pub async fn due_words(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<DueWord>> {
        self.due_words_as_of(user_id, limit, time::today()).await
    }

    pub async fn due_words_as_of(
        &self,
        user_id: &str,
        limit: Option<u32>,
        today: NaiveDate,
    ) -> Result<Vec<DueWord>> {
        let limit = self.settings.effective_review_limit(limit);
        let mut conn = self.db.acquire().await?;

        if !accounts::account_exists(&mut conn, user_id).await? {
            return Err(Error::NotFound(format!("Account {}", user_id)));
        }

        let words = progress::load_due_words(
            &mut conn,
            user_id,
            self.settings.review_mastery_threshold,
            today,
            limit,
        )
        .await?;

        debug!(
            user_id = %user_id,
            limit,
            returned = words.len(),
            "Selected review words"
        );
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_pool, seed_account};
    use crate::models::WordProgress;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    async fn seed_words(pool: &Pool<Sqlite>, words: &[(&str, f64, Option<NaiveDate>, Option<NaiveDate>)]) {
        let mut conn = pool.acquire().await.unwrap();
        for (word_id, mastery_level, last_review, next_review) in words {
            let mut progress = WordProgress::new(*word_id);
            progress.mastery_level = *mastery_level;
            progress.last_review = *last_review;
            progress.next_review = *next_review;
            progress::insert_record(&mut conn, "user_1", &progress, Utc::now())
                .await
                .unwrap();
        }
    }

    fn selector(pool: &Pool<Sqlite>) -> ReviewSelector {
        ReviewSelector::new(pool.clone(), Arc::new(ProgressSettings::default()))
    }

    #[tokio::test]
    async fn test_older_review_comes_first_within_mastery() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        seed_words(
            &pool,
            &[
                ("B", 1.0, date(2024, 2, 1), None),
                ("A", 1.0, date(2024, 1, 1), None),
            ],
        )
        .await;

        let due = selector(&pool)
            .due_words_as_of("user_1", Some(10), date(2024, 6, 1).unwrap())
            .await
            .unwrap();
        let ids: Vec<&str> = due.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_mastered_and_future_words_excluded() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let today = date(2024, 6, 1).unwrap();
        seed_words(
            &pool,
            &[
                ("mastered", 4.0, None, None),
                ("expert", 5.0, None, date(2024, 1, 1)),
                ("tomorrow", 1.0, None, date(2024, 6, 2)),
                ("today", 3.9, None, Some(today)),
                ("unscheduled", 2.0, date(2024, 5, 1), None),
            ],
        )
        .await;

        let due = selector(&pool)
            .due_words_as_of("user_1", None, today)
            .await
            .unwrap();
        let ids: Vec<&str> = due.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, vec!["unscheduled", "today"]);
        assert!(due.iter().all(|w| w.mastery_level < 4.0));
    }

    #[tokio::test]
    async fn test_limit_is_honored() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        seed_words(
            &pool,
            &[("a", 0.0, None, None), ("b", 0.0, None, None), ("c", 0.0, None, None)],
        )
        .await;

        let today = date(2024, 6, 1).unwrap();
        let selector = selector(&pool);
        assert_eq!(selector.due_words_as_of("user_1", Some(2), today).await.unwrap().len(), 2);
        assert!(selector.due_words_as_of("user_1", Some(0), today).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_unknown_accounts() {
        let pool = memory_pool().await;
        seed_account(&pool, "user_1").await;
        let selector = selector(&pool);
        let today = date(2024, 6, 1).unwrap();

        assert!(selector.due_words_as_of("user_1", None, today).await.unwrap().is_empty());
        assert!(matches!(
            selector.due_words_as_of("ghost", None, today).await,
            Err(Error::NotFound(_))
        ));
    }
}
