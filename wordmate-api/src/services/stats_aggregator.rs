//! Stats Aggregator
//!
//! Owns every write to the account's embedded counters. Two rules exist:
//! the sync rule (fall back to existing values, max_streak never drops,
//! last_active_date is the server's date) and the trial rule (plain
//! overwrite of a fresh account).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use wordmate_common::{Error, Result};

use crate::db::accounts;
use crate::models::{StatsUpdate, UserStats};

/// Combine stored stats with a client update
pub fn aggregate(existing: &UserStats, update: &StatsUpdate, today: NaiveDate) -> UserStats {
    let total_words_learned = update
        .total_words_learned
        .unwrap_or(existing.total_words_learned);
    let current_streak = update.current_streak.unwrap_or(existing.current_streak);
    let max_streak = existing
        .max_streak
        .max(update.max_streak.unwrap_or(0))
        .max(current_streak);

    UserStats {
        total_words_learned,
        current_streak,
        max_streak,
        last_active_date: Some(today),
    }
}

/// Stats of a freshly registered account taken from trial data
///
/// Omitted counters become zero. The trial date is kept when it parsed.
pub fn overwrite_from_trial(update: &StatsUpdate) -> UserStats {
    let current_streak = update.current_streak.unwrap_or(0);
    let mut max_streak = update.max_streak.unwrap_or(0);
    if max_streak < current_streak {
        warn!(
            current_streak,
            max_streak, "Trial max_streak below current_streak; raising it"
        );
        max_streak = current_streak;
    }

    UserStats {
        total_words_learned: update.total_words_learned.unwrap_or(0),
        current_streak,
        max_streak,
        last_active_date: update.last_active_date,
    }
}

/// Apply the sync rule to a stored account
pub async fn apply_sync_update(
    conn: &mut SqliteConnection,
    user_id: &str,
    update: &StatsUpdate,
    now: DateTime<Utc>,
) -> Result<UserStats> {
    let existing = accounts::load_stats(conn, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Account {}", user_id)))?;

    let merged = aggregate(&existing, update, now.date_naive());
    accounts::save_stats(conn, user_id, &merged, now).await?;

    debug!(
        user_id = %user_id,
        total_words_learned = merged.total_words_learned,
        current_streak = merged.current_streak,
        max_streak = merged.max_streak,
        "Stats updated"
    );
    Ok(merged)
}

/// Apply the trial rule to a stored account
pub async fn apply_trial_overwrite(
    conn: &mut SqliteConnection,
    user_id: &str,
    update: &StatsUpdate,
    now: DateTime<Utc>,
) -> Result<UserStats> {
    let stats = overwrite_from_trial(update);
    accounts::save_stats(conn, user_id, &stats, now).await?;
    Ok(stats)
}
