//! HTTP API handlers for wordmate-api

pub mod auth;
pub mod health;
pub mod identity;
pub mod progress;

pub use auth::auth_routes;
pub use health::health_routes;
pub use identity::{UserId, USER_ID_HEADER};
pub use progress::progress_routes;
