//! User account model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Maximum verification attempts before the cooldown kicks in.
const MAX_VERIFICATION_ATTEMPTS: u32 = 5;
/// Cooldown after exhausting verification attempts.
const VERIFICATION_COOLDOWN_HOURS: i64 = 1;

/// A registered (possibly not yet verified) user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_admin: bool,
    pub verification_attempts: u32,
    pub last_verification_attempt: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a fresh unverified user.
    pub fn new(phone_number: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            phone_number: phone_number.to_string(),
            email: None,
            first_name: None,
            last_name: None,
            is_verified: false,
            is_active: true,
            is_admin: false,
            verification_attempts: 0,
            last_verification_attempt: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    /// Whether another verification code may be requested.
    ///
    /// After `MAX_VERIFICATION_ATTEMPTS` the user must wait out a one hour
    /// cooldown measured from the last attempt.
    pub fn can_attempt_verification(&self) -> bool {
        if self.verification_attempts < MAX_VERIFICATION_ATTEMPTS {
            return true;
        }
        match self.last_verification_attempt {
            Some(last) => Utc::now() - last > Duration::hours(VERIFICATION_COOLDOWN_HOURS),
            None => false,
        }
    }

    /// Count a verification-code send.
    pub fn record_verification_attempt(&mut self) {
        self.verification_attempts += 1;
        self.last_verification_attempt = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Mark the phone number verified. Resets the attempt counter and stamps
    /// a login.
    pub fn mark_verified(&mut self) {
        self.is_verified = true;
        self.verification_attempts = 0;
        self.last_login = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn record_login(&mut self) {
        self.last_login = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Display name for personalized copy. Falls back to "there" so message
    /// templates always read naturally.
    pub fn display_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or("there")
    }

    /// Public API representation.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "user_id": self.id,
            "phone_number": self.phone_number,
            "email": self.email,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "is_verified": self.is_verified,
            "is_active": self.is_active,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
            "last_login": self.last_login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_user_can_attempt() {
        let user = User::new("+15551234567");
        assert!(user.can_attempt_verification());
        assert!(!user.is_verified);
    }

    #[test]
    fn test_attempts_exhausted_blocks_within_cooldown() {
        let mut user = User::new("+15551234567");
        for _ in 0..5 {
            user.record_verification_attempt();
        }
        assert!(!user.can_attempt_verification());
    }

    #[test]
    fn test_cooldown_expiry_allows_retry() {
        let mut user = User::new("+15551234567");
        user.verification_attempts = 5;
        user.last_verification_attempt = Some(Utc::now() - Duration::hours(2));
        assert!(user.can_attempt_verification());
    }

    #[test]
    fn test_exhausted_without_timestamp_stays_blocked() {
        let mut user = User::new("+15551234567");
        user.verification_attempts = 5;
        user.last_verification_attempt = None;
        assert!(!user.can_attempt_verification());
    }

    #[test]
    fn test_mark_verified_resets_attempts() {
        let mut user = User::new("+15551234567");
        user.record_verification_attempt();
        user.record_verification_attempt();
        user.mark_verified();
        assert!(user.is_verified);
        assert_eq!(user.verification_attempts, 0);
        assert!(user.last_login.is_some());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut user = User::new("+15551234567");
        assert_eq!(user.display_name(), "there");
        user.first_name = Some("Ada".into());
        assert_eq!(user.display_name(), "Ada");
    }
}
