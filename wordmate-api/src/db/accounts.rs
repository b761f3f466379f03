//! Account persistence, including the embedded stats

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use wordmate_common::{Error, Result};

use crate::models::{Account, PlanStatus, UserStats};

const ACCOUNT_COLUMNS: &str = "id, email, username, password_hash, device_id, grade, \
     registered_from_trial, total_words_learned, current_streak, max_streak, \
     last_active_date, plan, plan_status, plan_expires_at, created_at, updated_at, \
     last_login_at";

/// Values for a new account row
#[derive(Debug, Clone)]
pub struct AccountRow<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub device_id: &'a str,
    pub grade: &'a str,
    pub registered_from_trial: bool,
}

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let plan_status: String = row.try_get("plan_status")?;
    let plan_status = PlanStatus::parse(&plan_status)
        .ok_or_else(|| Error::Internal(format!("Unknown plan status: {}", plan_status)))?;

    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        device_id: row.try_get("device_id")?,
        grade: row.try_get("grade")?,
        registered_from_trial: row.try_get("registered_from_trial")?,
        stats: UserStats {
            total_words_learned: row.try_get("total_words_learned")?,
            current_streak: row.try_get("current_streak")?,
            max_streak: row.try_get("max_streak")?,
            last_active_date: row.try_get("last_active_date")?,
        },
        plan: row.try_get("plan")?,
        plan_status,
        plan_expires_at: row.try_get("plan_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_login_at: row.try_get("last_login_at")?,
    })
}

async fn load_by(
    conn: &mut SqliteConnection,
    column: &str,
    value: &str,
) -> Result<Option<Account>> {
    let query = format!(
        "SELECT {} FROM users WHERE {} = ? ORDER BY created_at LIMIT 1",
        ACCOUNT_COLUMNS, column
    );
    let row = sqlx::query(&query)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(account_from_row).transpose()
}

/// Insert a new account with zeroed stats
pub async fn insert_account(
    conn: &mut SqliteConnection,
    account: &AccountRow<'_>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, username, password_hash, device_id, grade,
            registered_from_trial, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account.id)
    .bind(account.email)
    .bind(account.username)
    .bind(account.password_hash)
    .bind(account.device_id)
    .bind(account.grade)
    .bind(account.registered_from_trial)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_account(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<Account>> {
    load_by(conn, "id", user_id).await
}

pub async fn find_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<Account>> {
    load_by(conn, "email", email).await
}

/// Usernames are not unique; the oldest matching account wins
pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Account>> {
    load_by(conn, "username", username).await
}

pub async fn find_by_device(
    conn: &mut SqliteConnection,
    device_id: &str,
) -> Result<Option<Account>> {
    load_by(conn, "device_id", device_id).await
}

pub async fn email_exists(conn: &mut SqliteConnection, email: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;

    Ok(exists)
}

pub async fn account_exists(conn: &mut SqliteConnection, user_id: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(exists)
}

/// Stats of one account, `None` when the account does not exist
pub async fn load_stats(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<UserStats>> {
    let row = sqlx::query(
        r#"
        SELECT total_words_learned, current_streak, max_streak, last_active_date
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(UserStats {
            total_words_learned: row.try_get("total_words_learned")?,
            current_streak: row.try_get("current_streak")?,
            max_streak: row.try_get("max_streak")?,
            last_active_date: row.try_get("last_active_date")?,
        })),
        None => Ok(None),
    }
}

/// Write all stats fields of an account
pub async fn save_stats(
    conn: &mut SqliteConnection,
    user_id: &str,
    stats: &UserStats,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            total_words_learned = ?,
            current_streak = ?,
            max_streak = ?,
            last_active_date = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(stats.total_words_learned)
    .bind(stats.current_streak)
    .bind(stats.max_streak)
    .bind(stats.last_active_date)
    .bind(now)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Account {}", user_id)));
    }
    Ok(())
}

pub async fn touch_last_login(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Delete an account; returns false when it did not exist
pub async fn delete_account(conn: &mut SqliteConnection, user_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
