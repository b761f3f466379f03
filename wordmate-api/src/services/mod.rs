//! Core services
//!
//! Merge Engine and Trial Importer are the only writers of progress rows;
//! both route stats changes through the Stats Aggregator.

pub mod account_service;
pub mod merge_engine;
pub mod password;
pub mod progress_summary;
pub mod review_selector;
pub mod stats_aggregator;
pub mod trial_importer;

pub use account_service::{AccountService, Registration};
pub use merge_engine::{MergeAction, MergeEngine};
pub use password::{PasswordHasher, Pbkdf2PasswordHasher};
pub use review_selector::ReviewSelector;
