//! Database initialization and schema

pub mod init;
pub mod write;

pub use init::*;
pub use write::{begin_write, retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
