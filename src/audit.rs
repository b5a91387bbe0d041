//! Persistent audit trail.
//!
//! Tracing covers operational logging; audit events that must survive in the
//! database (auth attempts, admin queries, vendor failures) additionally go
//! to the `system_logs` table through [`AuditLog`]. Persistence failures are
//! logged and swallowed so auditing never breaks a request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::store::Database;

/// Severity of a system log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "debug" => Self::Debug,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "critical" => Self::Critical,
            _ => Self::Info,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

/// Subsystem a log row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Auth,
    Onboarding,
    Document,
    Communication,
    Ai,
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Onboarding => "onboarding",
            Self::Document => "document",
            Self::Communication => "communication",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "auth" => Self::Auth,
            "onboarding" => Self::Onboarding,
            "document" => Self::Document,
            "communication" => Self::Communication,
            "ai" => Self::Ai,
            _ => Self::System,
        }
    }
}

/// A structured audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: String,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SystemLog {
    pub fn new(level: LogLevel, category: LogCategory, message: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            category,
            message: message.to_string(),
            user_id: None,
            session_id: None,
            request_id: None,
            metadata: json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "log_id": self.id,
            "level": self.level,
            "category": self.category,
            "message": self.message,
            "user_id": self.user_id,
            "session_id": self.session_id,
            "request_id": self.request_id,
            "metadata": self.metadata,
            "created_at": self.created_at,
        })
    }
}

/// Writes audit rows, never failing the caller.
#[derive(Clone)]
pub struct AuditLog {
    db: Arc<dyn Database>,
}

impl AuditLog {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn record(&self, log: SystemLog) {
        if let Err(e) = self.db.insert_system_log(&log).await {
            tracing::warn!(error = %e, "Failed to persist audit log");
        }
    }

    pub async fn auth_event(&self, event: &str, user_id: Option<&str>) {
        let mut log = SystemLog::new(LogLevel::Info, LogCategory::Auth, event);
        if let Some(id) = user_id {
            log = log.with_user(id);
        }
        self.record(log).await;
    }

    pub async fn onboarding_event(&self, event: &str, user_id: &str, session_id: &str) {
        self.record(
            SystemLog::new(LogLevel::Info, LogCategory::Onboarding, event)
                .with_user(user_id)
                .with_session(session_id),
        )
        .await;
    }

    pub async fn vendor_failure(&self, category: LogCategory, vendor: &str, error: &str) {
        self.record(
            SystemLog::new(LogLevel::Error, category, "Vendor call failed")
                .with_metadata(json!({"vendor": vendor, "error": error})),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
        ] {
            assert_eq!(LogLevel::parse(level.as_str()), level);
        }
    }

    #[test]
    fn test_error_levels() {
        assert!(LogLevel::Error.is_error());
        assert!(LogLevel::Critical.is_error());
        assert!(!LogLevel::Info.is_error());
    }

    #[test]
    fn test_builder_fields() {
        let log = SystemLog::new(LogLevel::Info, LogCategory::Auth, "login_success")
            .with_user("user-1")
            .with_session("session-1");
        assert_eq!(log.user_id.as_deref(), Some("user-1"));
        assert_eq!(log.session_id.as_deref(), Some("session-1"));
    }
}
