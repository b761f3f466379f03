//! # WordMate Common Library
//!
//! Shared code for the WordMate services:
//! - Error type and result alias
//! - Bootstrap configuration (TOML + overrides)
//! - Database initialization, schema and write transactions
//! - Date/time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
