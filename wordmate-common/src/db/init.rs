//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! Every statement is idempotent, so running it against an existing database
//! is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// How long a connection waits on another writer before SQLITE_BUSY
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Open (creating if needed) the database at `db_path` and initialize the schema
///
/// Pragmas are set through the connect options so every pooled connection
/// gets them, not just the first.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by WordMate
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_user_words_table(pool).await?;
    create_sessions_table(pool).await?;
    create_events_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table
///
/// Holds the account, its embedded learning stats and the subscription plan.
pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL,
            password_hash TEXT,
            device_id TEXT,
            grade TEXT NOT NULL DEFAULT 'grade6',
            registered_from_trial INTEGER NOT NULL DEFAULT 0,
            total_words_learned INTEGER NOT NULL DEFAULT 0 CHECK (total_words_learned >= 0),
            current_streak INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
            max_streak INTEGER NOT NULL DEFAULT 0 CHECK (max_streak >= current_streak),
            last_active_date DATE,
            plan TEXT NOT NULL DEFAULT 'free-trial',
            plan_status TEXT NOT NULL DEFAULT 'trial'
                CHECK (plan_status IN ('trial', 'active', 'expired')),
            plan_expires_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_login_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_device_id ON users(device_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_last_active ON users(last_active_date)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the user_words table (one progress row per user and word)
///
/// CHECK constraints keep the bounded spaced-repetition fields in range even
/// if a writer bypasses validation.
pub async fn create_user_words_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_words (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            word_id TEXT NOT NULL,
            mastery_level REAL NOT NULL DEFAULT 0.0
                CHECK (mastery_level >= 0.0 AND mastery_level <= 5.0),
            repetitions INTEGER NOT NULL DEFAULT 0 CHECK (repetitions >= 0),
            ease_factor REAL NOT NULL DEFAULT 2.5
                CHECK (ease_factor >= 1.3 AND ease_factor <= 5.0),
            last_review DATE,
            next_review DATE,
            seen_count INTEGER NOT NULL DEFAULT 0 CHECK (seen_count >= 0),
            correct_count INTEGER NOT NULL DEFAULT 0 CHECK (correct_count >= 0),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, word_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Review selection: filter on next_review, order on mastery then last_review
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_user_words_review_due ON user_words(user_id, next_review, mastery_level)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_user_words_mastery ON user_words(user_id, mastery_level, last_review)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sessions table (practice session summaries)
pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            practice_type TEXT NOT NULL
                CHECK (practice_type IN ('flashcard', 'typing', 'choice')),
            words_count INTEGER NOT NULL DEFAULT 0 CHECK (words_count >= 0),
            correct_count INTEGER NOT NULL DEFAULT 0 CHECK (correct_count >= 0),
            accuracy REAL NOT NULL DEFAULT 0.0 CHECK (accuracy >= 0.0 AND accuracy <= 100.0),
            duration_seconds INTEGER NOT NULL DEFAULT 0 CHECK (duration_seconds >= 0),
            started_at TIMESTAMP,
            completed_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_started ON sessions(user_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the events table (audit log)
///
/// Events outlive the account they reference; deletion nulls the user.
pub async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            event_type TEXT NOT NULL CHECK (event_type IN (
                'anonymous_trial', 'registration', 'login', 'payment',
                'session', 'sync', 'error'
            )),
            event_data TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_user_type ON events(user_id, event_type)")
        .execute(pool)
        .await?;

    Ok(())
}
