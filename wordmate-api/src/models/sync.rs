//! Results returned by merge, trial import and the progress summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::payload::EntryError;
use super::progress::ProgressRecord;
use super::session::SessionRecord;

/// How a conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    ClientWins,
}

/// The compared fields of one side of a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictValue {
    pub mastery_level: f64,
    pub repetitions: i64,
}

/// A word whose server and client values disagreed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub word_id: String,
    pub server_value: ConflictValue,
    pub client_value: ConflictValue,
    pub resolution: Resolution,
}

/// Outcome of one merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Entries created or updated
    #[serde(rename = "updated_words")]
    pub updated_count: usize,
    pub conflicts: Vec<SyncConflict>,
    /// Entries that were not applied, with the reason
    pub skipped: Vec<EntryError>,
    pub sync_timestamp: DateTime<Utc>,
}

/// Counts from a trial import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialImportReport {
    pub words_imported: usize,
    pub sessions_imported: usize,
    pub stats_applied: bool,
    pub skipped: Vec<EntryError>,
}

/// Everything the client needs to rebuild its local state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Profile, embedded stats and plan
    pub account: Account,
    pub words: Vec<ProgressRecord>,
    pub sessions: Vec<SessionRecord>,
    pub sync_timestamp: DateTime<Utc>,
}
