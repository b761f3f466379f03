//! Data models

pub mod account;
pub mod payload;
pub mod progress;
pub mod session;
pub mod sync;

pub use account::{Account, Credential, LoginRequest, NewAccount, PlanStatus, UserStats};
pub use payload::{
    DateParsing, EntryError, PracticeType, ProgressPayload, SessionSummary, StatsUpdate,
    SyncBatch, TrialPayload,
};
pub use progress::{DueWord, ProgressRecord, WordProgress};
pub use session::SessionRecord;
pub use sync::{
    ConflictValue, ProgressSummary, Resolution, SyncConflict, SyncOutcome, TrialImportReport,
};
