//! wordmate-api library interface
//!
//! Progress synchronization and review scheduling for WordMate accounts,
//! plus the axum router that exposes them.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use wordmate_common::config::ProgressSettings;

use crate::services::{AccountService, MergeEngine, PasswordHasher, ReviewSelector};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<ProgressSettings>,
    pub hasher: Arc<dyn PasswordHasher>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        settings: ProgressSettings,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            hasher,
            startup_time: Utc::now(),
        }
    }

    pub fn merge_engine(&self) -> MergeEngine {
        MergeEngine::new(self.db.clone())
    }

    pub fn review_selector(&self) -> ReviewSelector {
        ReviewSelector::new(self.db.clone(), Arc::clone(&self.settings))
    }

    pub fn account_service(&self) -> AccountService {
        AccountService::new(
            self.db.clone(),
            Arc::clone(&self.hasher),
            Arc::clone(&self.settings),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::progress_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
