//! Account, registration and login types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::payload::ProgressPayload;

/// Grade assigned when registration does not name one
pub const DEFAULT_GRADE: &str = "grade6";

const MAX_USERNAME_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;

/// Denormalized learning counters embedded in the account
///
/// Invariant: `max_streak >= current_streak`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_words_learned: i64,
    pub current_streak: i64,
    pub max_streak: i64,
    pub last_active_date: Option<NaiveDate>,
}

/// Subscription plan state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Trial,
    Active,
    Expired,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Trial => "trial",
            PlanStatus::Active => "active",
            PlanStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "trial" => Some(PlanStatus::Trial),
            "active" => Some(PlanStatus::Active),
            "expired" => Some(PlanStatus::Expired),
            _ => None,
        }
    }
}

/// Stored account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub device_id: Option<String>,
    pub grade: String,
    pub registered_from_trial: bool,
    pub stats: UserStats,
    pub plan: String,
    pub plan_status: PlanStatus,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_passwordless(&self) -> bool {
        self.password_hash.is_none()
    }
}

/// Registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub trial_data: Option<ProgressPayload>,
}

impl NewAccount {
    /// Check the request fields, returning the first problem found
    pub fn validate(&self) -> Result<(), String> {
        let username_len = self.username.trim().chars().count();
        if username_len == 0 || username_len > MAX_USERNAME_LEN {
            return Err(format!(
                "username must be 1 to {} characters",
                MAX_USERNAME_LEN
            ));
        }

        if !is_plausible_email(&self.email) {
            return Err(format!("'{}' is not a valid email address", self.email));
        }

        if let Some(grade) = &self.grade {
            if !is_valid_grade(grade) {
                return Err(format!("unknown grade '{}'", grade));
            }
        }

        if let Some(password) = &self.password {
            let len = password.chars().count();
            if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
                return Err(format!(
                    "password must be {} to {} characters",
                    MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
                ));
            }
        }

        Ok(())
    }

    pub fn grade_or_default(&self) -> &str {
        self.grade.as_deref().unwrap_or(DEFAULT_GRADE)
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn is_valid_grade(grade: &str) -> bool {
    grade
        .strip_prefix("grade")
        .and_then(|n| n.parse::<u8>().ok())
        .map(|n| (1..=9).contains(&n) && grade.len() == 6)
        .unwrap_or(false)
}

/// Login request as it arrives over HTTP
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// One way of identifying an account at login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Email {
        email: String,
        password: Option<String>,
    },
    Username {
        username: String,
        password: Option<String>,
    },
    Device {
        device_id: String,
    },
}

impl TryFrom<LoginRequest> for Credential {
    type Error = String;

    /// Email wins over username, username over device id
    fn try_from(request: LoginRequest) -> Result<Self, Self::Error> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(email) = present(request.email) {
            return Ok(Credential::Email {
                email,
                password: request.password,
            });
        }
        if let Some(username) = present(request.username) {
            return Ok(Credential::Username {
                username,
                password: request.password,
            });
        }
        if let Some(device_id) = present(request.device_id) {
            return Ok(Credential::Device { device_id });
        }
        Err("one of email, username or device_id is required".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account() -> NewAccount {
        NewAccount {
            email: "kid@example.com".to_string(),
            username: "kid".to_string(),
            ..NewAccount::default()
        }
    }

    #[test]
    fn test_valid_registration() {
        let account = new_account();
        assert!(account.validate().is_ok());
        assert_eq!(account.grade_or_default(), "grade6");
    }

    #[test]
    fn test_registration_rejections() {
        let mut account = new_account();
        account.username = "".to_string();
        assert!(account.validate().is_err());

        let mut account = new_account();
        account.username = "x".repeat(101);
        assert!(account.validate().is_err());

        for email in ["kid", "kid@", "@example.com", "kid@example", "k id@example.com"] {
            let mut account = new_account();
            account.email = email.to_string();
            assert!(account.validate().is_err(), "accepted {}", email);
        }

        let mut account = new_account();
        account.password = Some("12345".to_string());
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_grades() {
        assert!(is_valid_grade("grade1"));
        assert!(is_valid_grade("grade9"));
        assert!(!is_valid_grade("grade0"));
        assert!(!is_valid_grade("grade10"));
        assert!(!is_valid_grade("grade+3"));
        assert!(!is_valid_grade("year6"));
    }

    #[test]
    fn test_credential_precedence() {
        let request = LoginRequest {
            email: Some("kid@example.com".to_string()),
            username: Some("kid".to_string()),
            password: Some("secret1".to_string()),
            device_id: Some("device_1".to_string()),
        };
        assert_eq!(
            Credential::try_from(request).unwrap(),
            Credential::Email {
                email: "kid@example.com".to_string(),
                password: Some("secret1".to_string()),
            }
        );

        let request = LoginRequest {
            username: Some("kid".to_string()),
            device_id: Some("device_1".to_string()),
            ..LoginRequest::default()
        };
        assert!(matches!(
            Credential::try_from(request).unwrap(),
            Credential::Username { password: None, .. }
        ));

        let request = LoginRequest {
            email: Some("  ".to_string()),
            device_id: Some("device_1".to_string()),
            ..LoginRequest::default()
        };
        assert_eq!(
            Credential::try_from(request).unwrap(),
            Credential::Device {
                device_id: "device_1".to_string()
            }
        );

        assert!(Credential::try_from(LoginRequest::default()).is_err());
    }
}
