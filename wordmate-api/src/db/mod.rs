//! Database access for wordmate-api
//!
//! Schema creation lives in `wordmate_common::db`; this module holds the
//! queries. Every function takes a `SqliteConnection` so services can
//! compose them inside one transaction.

pub mod accounts;
pub mod events;
pub mod progress;
pub mod sessions;
