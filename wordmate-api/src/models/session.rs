//! Stored practice sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::PracticeType;

/// A persisted practice session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub practice_type: PracticeType,
    pub words_count: i64,
    pub correct_count: i64,
    pub accuracy: f64,
    pub duration_seconds: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
