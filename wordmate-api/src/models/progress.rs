//! Per-word progress types
//!
//! `ProgressRecord` is the stored row; `WordProgress` is the validated set of
//! values a writer (merge, trial import, scoring) puts into a row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lowest mastery level
pub const MASTERY_MIN: f64 = 0.0;
/// Highest mastery level
pub const MASTERY_MAX: f64 = 5.0;
/// Lowest ease factor
pub const EASE_MIN: f64 = 1.3;
/// Highest ease factor
pub const EASE_MAX: f64 = 5.0;

/// Mastery level of a word that has no recorded progress
pub const DEFAULT_MASTERY: f64 = 0.0;
/// Ease factor of a word that has no recorded progress
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Longest accepted word identifier
pub const MAX_WORD_ID_LEN: usize = 100;

/// Stored progress for one (user, word) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgressRecord {
    pub user_id: String,
    pub word_id: String,
    pub mastery_level: f64,
    pub repetitions: i64,
    pub ease_factor: f64,
    pub last_review: Option<NaiveDate>,
    pub next_review: Option<NaiveDate>,
    pub seen_count: i64,
    pub correct_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// The writable values of this record
    pub fn progress(&self) -> WordProgress {
        WordProgress {
            word_id: self.word_id.clone(),
            mastery_level: self.mastery_level,
            repetitions: self.repetitions,
            ease_factor: self.ease_factor,
            last_review: self.last_review,
            next_review: self.next_review,
            seen_count: self.seen_count,
            correct_count: self.correct_count,
        }
    }
}

/// Validated progress values for one word
///
/// Construct through [`WordProgress::new`] plus field updates, then call
/// [`WordProgress::validate`]; the payload parsers do both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordProgress {
    pub word_id: String,
    pub mastery_level: f64,
    pub repetitions: i64,
    pub ease_factor: f64,
    pub last_review: Option<NaiveDate>,
    pub next_review: Option<NaiveDate>,
    pub seen_count: i64,
    pub correct_count: i64,
}

impl WordProgress {
    /// Progress for `word_id` with every field at its default
    pub fn new(word_id: impl Into<String>) -> Self {
        Self {
            word_id: word_id.into(),
            mastery_level: DEFAULT_MASTERY,
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            last_review: None,
            next_review: None,
            seen_count: 0,
            correct_count: 0,
        }
    }

    /// Check identifier and field bounds
    ///
    /// next_review is deliberately not compared with last_review.
    pub fn validate(&self) -> Result<(), String> {
        if self.word_id.trim().is_empty() {
            return Err("word_id must not be empty".to_string());
        }
        if self.word_id.chars().count() > MAX_WORD_ID_LEN {
            return Err(format!("word_id longer than {} characters", MAX_WORD_ID_LEN));
        }
        if !self.mastery_level.is_finite()
            || !(MASTERY_MIN..=MASTERY_MAX).contains(&self.mastery_level)
        {
            return Err(format!(
                "mastery_level {} outside [{}, {}]",
                self.mastery_level, MASTERY_MIN, MASTERY_MAX
            ));
        }
        if !self.ease_factor.is_finite() || !(EASE_MIN..=EASE_MAX).contains(&self.ease_factor) {
            return Err(format!(
                "ease_factor {} outside [{}, {}]",
                self.ease_factor, EASE_MIN, EASE_MAX
            ));
        }
        for (name, value) in [
            ("repetitions", self.repetitions),
            ("seen_count", self.seen_count),
            ("correct_count", self.correct_count),
        ] {
            if value < 0 {
                return Err(format!("{} must be non-negative, got {}", name, value));
            }
        }
        Ok(())
    }

    /// True when mastery_level or repetitions differ from `record`
    ///
    /// These are the only fields that count as a sync conflict; ease_factor
    /// and the counters may diverge silently.
    pub fn conflicts_with(&self, record: &ProgressRecord) -> bool {
        self.mastery_level != record.mastery_level || self.repetitions != record.repetitions
    }
}

/// One row of the due-for-review listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DueWord {
    pub word_id: String,
    pub mastery_level: f64,
    pub last_review: Option<NaiveDate>,
    pub seen_count: i64,
    pub repetitions: i64,
}
