//! Client payloads: sync batches and anonymous trial data
//!
//! Both arrive as `{words, sessions, stats}`. The wire form keeps each entry
//! as raw JSON so that one malformed entry cannot reject the whole request;
//! [`SyncBatch`] and [`TrialPayload`] validate entry by entry and keep the
//! rejects as [`EntryError`]s.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use wordmate_common::time;

use super::progress::WordProgress;

/// Wire shape shared by the sync request and registration `trial_data`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(default)]
    pub words: Vec<Value>,
    #[serde(default)]
    pub sessions: Vec<Value>,
    #[serde(default)]
    pub stats: Option<Value>,
}

/// A rejected batch entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryError {
    /// Position of the entry in the submitted list
    pub index: usize,
    /// Word identifier, when one could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_id: Option<String>,
    pub reason: String,
}

impl EntryError {
    pub fn new(index: usize, word_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            word_id,
            reason: reason.into(),
        }
    }
}

/// How date fields inside a word entry are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParsing {
    /// `YYYY-MM-DD` or null; anything else rejects the entry
    Strict,
    /// Any recognizable date or timestamp; anything else becomes absent
    Lenient,
}

/// Validated sync batch
#[derive(Debug, Clone, Default)]
pub struct SyncBatch {
    /// Number of word entries submitted
    pub submitted: usize,
    /// Valid entries with their submitted index
    pub entries: Vec<(usize, WordProgress)>,
    /// Entries rejected at the boundary
    pub rejected: Vec<EntryError>,
    /// Aggregate stats, present when the client sent a non-empty stats map
    pub stats: Option<StatsUpdate>,
    /// Session summaries are accepted on the wire but not merged
    pub session_count: usize,
}

impl SyncBatch {
    pub fn from_payload(payload: &ProgressPayload) -> Self {
        let (entries, rejected) = parse_word_entries(&payload.words, DateParsing::Strict);
        Self {
            submitted: payload.words.len(),
            entries,
            rejected,
            stats: stats_map(payload.stats.as_ref()).map(StatsUpdate::from_map),
            session_count: payload.sessions.len(),
        }
    }
}

/// Validated trial payload
#[derive(Debug, Clone, Default)]
pub struct TrialPayload {
    pub words: Vec<(usize, WordProgress)>,
    pub rejected_words: Vec<EntryError>,
    /// The most recent sessions by input order, already capped
    pub sessions: Vec<(usize, SessionSummary)>,
    pub rejected_sessions: Vec<EntryError>,
    pub stats: Option<StatsUpdate>,
}

impl TrialPayload {
    /// Validate trial data, keeping at most `session_cap` sessions
    ///
    /// The cap keeps the last entries as submitted, not the newest by
    /// timestamp. Session indices refer to the original list.
    pub fn from_payload(payload: &ProgressPayload, session_cap: usize) -> Self {
        let (words, rejected_words) = parse_word_entries(&payload.words, DateParsing::Lenient);

        let skip = payload.sessions.len().saturating_sub(session_cap);
        let mut sessions = Vec::new();
        let mut rejected_sessions = Vec::new();
        for (index, raw) in payload.sessions.iter().enumerate().skip(skip) {
            match SessionSummary::from_value(raw) {
                Ok(session) => sessions.push((index, session)),
                Err(reason) => rejected_sessions.push(EntryError::new(index, None, reason)),
            }
        }

        Self {
            words,
            rejected_words,
            sessions,
            rejected_sessions,
            stats: stats_map(payload.stats.as_ref()).map(StatsUpdate::from_map),
        }
    }
}

fn parse_word_entries(
    raw: &[Value],
    dates: DateParsing,
) -> (Vec<(usize, WordProgress)>, Vec<EntryError>) {
    let mut entries = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for (index, value) in raw.iter().enumerate() {
        match parse_word_entry(value, dates) {
            Ok(progress) => entries.push((index, progress)),
            Err(reason) => {
                let word_id = value
                    .get("word_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                rejected.push(EntryError::new(index, word_id, reason));
            }
        }
    }

    (entries, rejected)
}

/// Parse and validate one word entry
///
/// Missing or null numeric fields take the documented defaults.
pub fn parse_word_entry(value: &Value, dates: DateParsing) -> Result<WordProgress, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "entry is not an object".to_string())?;

    let word_id = match obj.get("word_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => return Err("word_id is required".to_string()),
        Some(_) => return Err("word_id must be a string".to_string()),
    };

    let mut progress = WordProgress::new(word_id);
    if let Some(v) = opt_f64(obj, "mastery_level")? {
        progress.mastery_level = v;
    }
    if let Some(v) = opt_f64(obj, "ease_factor")? {
        progress.ease_factor = v;
    }
    if let Some(v) = opt_count(obj, "repetitions")? {
        progress.repetitions = v;
    }
    if let Some(v) = opt_count(obj, "seen_count")? {
        progress.seen_count = v;
    }
    if let Some(v) = opt_count(obj, "correct_count")? {
        progress.correct_count = v;
    }
    progress.last_review = opt_date(obj, "last_review", dates)?;
    progress.next_review = opt_date(obj, "next_review", dates)?;

    progress.validate()?;
    Ok(progress)
}

fn opt_f64(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{} must be a number", key)),
    }
}

/// Non-negative integer; integral floats such as `3.0` are accepted
fn opt_count(obj: &Map<String, Value>, key: &str) -> Result<Option<i64>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_count(v)
            .map(Some)
            .ok_or_else(|| format!("{} must be a non-negative integer", key)),
    }
}

fn as_count(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_u64() {
        return i64::try_from(n).ok();
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

fn opt_date(
    obj: &Map<String, Value>,
    key: &str,
    dates: DateParsing,
) -> Result<Option<NaiveDate>, String> {
    let raw = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(v) => v,
    };

    match dates {
        DateParsing::Strict => raw
            .as_str()
            .and_then(time::parse_date)
            .map(Some)
            .ok_or_else(|| format!("{} must be a YYYY-MM-DD date", key)),
        DateParsing::Lenient => Ok(raw.as_str().and_then(time::parse_date_lenient)),
    }
}

/// The stats map counts as present only when it is a non-empty object
fn stats_map(stats: Option<&Value>) -> Option<&Map<String, Value>> {
    stats
        .and_then(Value::as_object)
        .filter(|map| !map.is_empty())
}

/// Partial aggregate stats sent by a client
///
/// Fields the client omitted, or sent with an unusable value, are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsUpdate {
    pub total_words_learned: Option<i64>,
    pub current_streak: Option<i64>,
    pub max_streak: Option<i64>,
    /// Only honoured by trial import; sync stamps the server date instead
    pub last_active_date: Option<NaiveDate>,
}

impl StatsUpdate {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            total_words_learned: stat_field(map, "total_words_learned"),
            current_streak: stat_field(map, "current_streak"),
            max_streak: stat_field(map, "max_streak"),
            last_active_date: map
                .get("last_active_date")
                .and_then(Value::as_str)
                .and_then(time::parse_date_lenient),
        }
    }
}

fn stat_field(map: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = map.get(key)?;
    if value.is_null() {
        return None;
    }
    let parsed = as_count(value);
    if parsed.is_none() {
        warn!(field = key, value = %value, "Ignoring unusable stats value");
    }
    parsed
}

/// Kind of practice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeType {
    Flashcard,
    Typing,
    Choice,
}

impl PracticeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeType::Flashcard => "flashcard",
            PracticeType::Typing => "typing",
            PracticeType::Choice => "choice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "flashcard" => Some(PracticeType::Flashcard),
            "typing" => Some(PracticeType::Typing),
            "choice" => Some(PracticeType::Choice),
            _ => None,
        }
    }
}

/// Summary of one practice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub practice_type: PracticeType,
    pub words_count: i64,
    pub correct_count: i64,
    /// Percentage in [0, 100]
    pub accuracy: f64,
    pub duration_seconds: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionSummary {
    /// Parse a session summary; timestamps are best-effort
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "session is not an object".to_string())?;

        let practice_type = match obj.get("practice_type") {
            None | Some(Value::Null) => PracticeType::Flashcard,
            Some(Value::String(s)) => PracticeType::parse(s)
                .ok_or_else(|| format!("unknown practice_type '{}'", s))?,
            Some(_) => return Err("practice_type must be a string".to_string()),
        };

        let accuracy = opt_f64(obj, "accuracy")?.unwrap_or(0.0);
        if !(0.0..=100.0).contains(&accuracy) {
            return Err(format!("accuracy {} outside [0, 100]", accuracy));
        }

        let timestamp = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .and_then(time::parse_datetime_lenient)
        };

        Ok(Self {
            practice_type,
            words_count: opt_count(obj, "words_count")?.unwrap_or(0),
            correct_count: opt_count(obj, "correct_count")?.unwrap_or(0),
            accuracy,
            duration_seconds: opt_count(obj, "duration_seconds")?.unwrap_or(0),
            started_at: timestamp("started_at"),
            completed_at: timestamp("completed_at"),
        })
    }
}
