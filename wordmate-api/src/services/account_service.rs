//! Account lifecycle: registration with trial import, login, deletion

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wordmate_common::config::ProgressSettings;
use wordmate_common::db::{begin_write, retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use wordmate_common::{time, Error, Result};

use crate::db::accounts::{self, AccountRow};
use crate::db::events::{self, EventType};
use crate::models::{Account, Credential, NewAccount, TrialImportReport, TrialPayload};
use crate::services::password::PasswordHasher;
use crate::services::trial_importer;

/// A created account and what its trial import brought along
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub account: Account,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_import: Option<TrialImportReport>,
}

pub fn generate_user_id(now: DateTime<Utc>) -> String {
    format!("user_{}_{:08x}", now.timestamp(), rand::thread_rng().gen::<u32>())
}

pub fn generate_device_id(now: DateTime<Utc>) -> String {
    format!("device_{}_{:016x}", now.timestamp(), rand::thread_rng().gen::<u64>())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account service
pub struct AccountService {
    db: Pool<Sqlite>,
    hasher: Arc<dyn PasswordHasher>,
    settings: Arc<ProgressSettings>,
}

impl AccountService {
    pub fn new(
        db: Pool<Sqlite>,
        hasher: Arc<dyn PasswordHasher>,
        settings: Arc<ProgressSettings>,
    ) -> Self {
        Self {
            db,
            hasher,
            settings,
        }
    }

    /// Create an account, importing trial data when present
    ///
    /// Account row, trial import and audit event commit together; if any
    /// part fails nothing is stored.
    pub async fn register(&self, request: &NewAccount) -> Result<Registration> {
        request.validate().map_err(Error::InvalidInput)?;

        let now = time::now();
        let email = normalize_email(&request.email);
        let username = request.username.trim();
        let grade = request.grade_or_default();
        let device_id = request
            .device_id
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| generate_device_id(now));
        let password_hash = request
            .password
            .as_deref()
            .map(|p| self.hasher.hash(p))
            .transpose()?;
        let user_id = generate_user_id(now);

        let row = AccountRow {
            id: &user_id,
            email: &email,
            username,
            password_hash: password_hash.as_deref(),
            device_id: &device_id,
            grade,
            registered_from_trial: request.trial_data.is_some(),
        };
        let registration = retry_on_lock("registration", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.create_account(&row, request, now)
        })
        .await?;

        info!(
            user_id = %user_id,
            from_trial = registration.trial_import.is_some(),
            passwordless = registration.account.is_passwordless(),
            "Account registered"
        );

        Ok(registration)
    }

    async fn create_account(
        &self,
        row: &AccountRow<'_>,
        request: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Registration> {
        let mut tx = begin_write(&self.db).await?;

        if accounts::email_exists(&mut *tx, row.email).await? {
            return Err(Error::AlreadyExists(format!(
                "Email {} is already registered",
                row.email
            )));
        }

        accounts::insert_account(&mut *tx, row, now).await?;

        let trial_import = match &request.trial_data {
            Some(payload) => {
                let trial = TrialPayload::from_payload(payload, self.settings.trial_session_cap);
                Some(trial_importer::import_trial(&mut tx, row.id, &trial, now).await?)
            }
            None => None,
        };

        let method = if row.password_hash.is_some() {
            "email"
        } else {
            "passwordless"
        };
        events::insert_event(
            &mut tx,
            Some(row.id),
            EventType::Registration,
            &json!({
                "method": method,
                "from_trial": trial_import.is_some(),
                "grade": row.grade,
                "device_id": row.device_id,
            }),
            now,
        )
        .await?;

        let account = accounts::load_account(&mut tx, row.id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Account {} missing after insert", row.id)))?;

        tx.commit().await?;

        Ok(Registration {
            account,
            trial_import,
        })
    }

    /// Resolve a credential to an account
    ///
    /// `Ok(None)` means the credential did not identify or authenticate
    /// anyone. Success stamps the login time and writes an audit event.
    /// Lookup and password check run before the write lock is taken.
    pub async fn authenticate(&self, credential: &Credential) -> Result<Option<Account>> {
        let (account, method) = {
            let mut conn = self.db.acquire().await?;
            match credential {
                Credential::Email { email, password } => {
                    let account = accounts::find_by_email(&mut conn, &normalize_email(email)).await?;
                    (self.check_password(account, password.as_deref()), "email")
                }
                Credential::Username { username, password } => {
                    let account = accounts::find_by_username(&mut conn, username.trim()).await?;
                    (self.check_password(account, password.as_deref()), "username")
                }
                Credential::Device { device_id } => {
                    (accounts::find_by_device(&mut conn, device_id).await?, "device")
                }
            }
        };

        let Some(account) = account else {
            debug!(method, "Login rejected");
            return Ok(None);
        };

        let account = retry_on_lock("login", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.record_login(&account.id, method)
        })
        .await?;

        info!(user_id = %account.id, method, "Login succeeded");
        Ok(Some(account))
    }

    async fn record_login(&self, user_id: &str, method: &str) -> Result<Account> {
        let now = time::now();
        let mut tx = begin_write(&self.db).await?;

        accounts::touch_last_login(&mut tx, user_id, now).await?;
        events::insert_event(
            &mut tx,
            Some(user_id),
            EventType::Login,
            &json!({ "method": method }),
            now,
        )
        .await?;

        // Deleted between lookup and stamp
        let account = accounts::load_account(&mut tx, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Account {}", user_id)))?;

        tx.commit().await?;
        Ok(account)
    }

    /// Accounts without a password hash accept any or no password
    fn check_password(&self, account: Option<Account>, password: Option<&str>) -> Option<Account> {
        let account = account?;
        let accepted = match (account.password_hash.as_deref(), password) {
            (Some(stored), Some(password)) => self.hasher.verify(password, stored),
            (Some(_), None) => false,
            (None, _) => true,
        };

        if accepted {
            Some(account)
        } else {
            warn!(user_id = %account.id, "Password check failed");
            None
        }
    }

    pub async fn load(&self, user_id: &str) -> Result<Account> {
        let mut conn = self.db.acquire().await?;
        accounts::load_account(&mut conn, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Account {}", user_id)))
    }

    /// Delete an account with its progress and sessions
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        if !accounts::delete_account(&mut conn, user_id).await? {
            return Err(Error::NotFound(format!("Account {}", user_id)));
        }
        info!(user_id = %user_id, "Account deleted");
        Ok(())
    }
}
