//! Full progress snapshot for a client that needs to rebuild local state

use chrono::{DateTime, Datelike, TimeZone, Utc};
use sqlx::{Pool, Sqlite};
use wordmate_common::{time, Error, Result};

use crate::db::{accounts, progress, sessions};
use crate::models::ProgressSummary;

/// Most sessions returned in one summary
pub const SUMMARY_SESSION_LIMIT: u32 = 50;

/// Midnight UTC on the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub async fn progress_summary(db: &Pool<Sqlite>, user_id: &str) -> Result<ProgressSummary> {
    progress_summary_at(db, user_id, time::now()).await
}

/// Account, every progress record and this month's sessions
///
/// Reads run in one transaction so the parts agree with each other.
pub async fn progress_summary_at(
    db: &Pool<Sqlite>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<ProgressSummary> {
    let mut tx = db.begin().await?;

    let account = accounts::load_account(&mut tx, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Account {}", user_id)))?;
    let words = progress::load_records_for_user(&mut tx, user_id).await?;
    let sessions =
        sessions::load_sessions_since(&mut tx, user_id, month_start(now), SUMMARY_SESSION_LIMIT)
            .await?;

    tx.commit().await?;

    Ok(ProgressSummary {
        account,
        words,
        sessions,
        sync_timestamp: now,
    })
}
