//! Trial Importer: absorb anonymous trial history into a new account
//!
//! Runs inside the registration transaction. Words and sessions are
//! imported best-effort; a row the store refuses is skipped, any other
//! failure aborts the registration.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use wordmate_common::Result;

use crate::db::events::{self, EventType};
use crate::db::{progress, sessions};
use crate::models::{EntryError, TrialImportReport, TrialPayload};
use crate::services::stats_aggregator;

/// Import `trial` into the freshly created account `user_id`
///
/// Existing records are never consulted; a repeated word id in the trial
/// data collides with the first and is skipped.
pub async fn import_trial(
    conn: &mut SqliteConnection,
    user_id: &str,
    trial: &TrialPayload,
    now: DateTime<Utc>,
) -> Result<TrialImportReport> {
    let mut report = TrialImportReport::default();

    for rejected in trial.rejected_words.iter().chain(&trial.rejected_sessions) {
        warn!(
            user_id = %user_id,
            index = rejected.index,
            word_id = ?rejected.word_id,
            reason = %rejected.reason,
            "Skipping invalid trial entry"
        );
    }
    report.skipped.extend(trial.rejected_words.iter().cloned());

    for (index, word) in &trial.words {
        match progress::insert_record(conn, user_id, word, now).await {
            Ok(()) => report.words_imported += 1,
            Err(e) if e.is_entry_recoverable() => {
                warn!(
                    user_id = %user_id,
                    index,
                    word_id = %word.word_id,
                    error = %e,
                    "Skipping trial word rejected by the store"
                );
                report
                    .skipped
                    .push(EntryError::new(*index, Some(word.word_id.clone()), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    report.skipped.extend(trial.rejected_sessions.iter().cloned());

    for (index, session) in &trial.sessions {
        match sessions::insert_session(conn, user_id, session).await {
            Ok(_) => report.sessions_imported += 1,
            Err(e) if e.is_entry_recoverable() => {
                warn!(
                    user_id = %user_id,
                    index,
                    error = %e,
                    "Skipping trial session rejected by the store"
                );
                report.skipped.push(EntryError::new(*index, None, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(update) = &trial.stats {
        stats_aggregator::apply_trial_overwrite(conn, user_id, update, now).await?;
        report.stats_applied = true;
    }

    events::insert_event(
        conn,
        Some(user_id),
        EventType::AnonymousTrial,
        &json!({
            "words_imported": report.words_imported,
            "sessions_imported": report.sessions_imported,
            "stats_applied": report.stats_applied,
            "skipped": report.skipped.len(),
        }),
        now,
    )
    .await?;

    info!(
        user_id = %user_id,
        words = report.words_imported,
        sessions = report.sessions_imported,
        skipped = report.skipped.len(),
        "Trial data imported"
    );

    Ok(report)
}
