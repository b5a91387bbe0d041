//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ai::model::{AiInteraction, Feedback};
use crate::audit::{LogCategory, LogLevel, SystemLog};
use crate::auth::user::User;
use crate::comms::model::Communication;
use crate::documents::model::Document;
use crate::error::DatabaseError;
use crate::onboarding::session::OnboardingSession;

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` items.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page))
    }
}

/// Filters for the admin user listing.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub page: u32,
    pub per_page: u32,
    pub verified: Option<bool>,
    /// Substring match over phone, email, and names.
    pub search: Option<String>,
}

/// Filters for the admin log listing.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub page: u32,
    pub per_page: u32,
    pub level: Option<LogLevel>,
    pub category: Option<LogCategory>,
}

/// Per-kind AI usage aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionStats {
    pub kind: String,
    pub count: u64,
    pub avg_processing_time_ms: Option<f64>,
    pub total_cost_usd: Decimal,
}

/// Backend-agnostic database trait covering every persisted entity.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError>;

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>, DatabaseError>;

    /// Persist all mutable fields of a user.
    async fn update_user(&self, user: &User) -> Result<(), DatabaseError>;

    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, DatabaseError>;

    /// Count users, optionally restricted to verified ones and/or a window.
    async fn count_users(
        &self,
        since: Option<DateTime<Utc>>,
        verified_only: bool,
    ) -> Result<u64, DatabaseError>;

    // ── Onboarding sessions ─────────────────────────────────────────

    async fn insert_session(&self, session: &OnboardingSession) -> Result<(), DatabaseError>;

    async fn get_session(&self, id: &str) -> Result<Option<OnboardingSession>, DatabaseError>;

    async fn update_session(&self, session: &OnboardingSession) -> Result<(), DatabaseError>;

    /// Most recently created session for a user.
    async fn latest_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingSession>, DatabaseError>;

    /// Most recent session still in `initiated`/`in_progress`.
    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingSession>, DatabaseError>;

    async fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<OnboardingSession>, DatabaseError>;

    async fn count_sessions(
        &self,
        since: Option<DateTime<Utc>>,
        completed_only: bool,
    ) -> Result<u64, DatabaseError>;

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, document: &Document) -> Result<(), DatabaseError>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>, DatabaseError>;

    async fn update_document(&self, document: &Document) -> Result<(), DatabaseError>;

    async fn documents_for_user(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Document>, DatabaseError>;

    async fn count_documents(&self, since: Option<DateTime<Utc>>) -> Result<u64, DatabaseError>;

    // ── Communications ──────────────────────────────────────────────

    async fn insert_communication(&self, comm: &Communication) -> Result<(), DatabaseError>;

    async fn update_communication(&self, comm: &Communication) -> Result<(), DatabaseError>;

    // ── AI interactions ─────────────────────────────────────────────

    async fn insert_interaction(&self, interaction: &AiInteraction) -> Result<(), DatabaseError>;

    async fn get_interaction(&self, id: &str) -> Result<Option<AiInteraction>, DatabaseError>;

    /// Attach feedback to an interaction. `NotFound` when the row is missing.
    async fn update_interaction_feedback(
        &self,
        id: &str,
        feedback: Feedback,
        details: Option<&str>,
    ) -> Result<(), DatabaseError>;

    async fn interactions_for_user(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<AiInteraction>, DatabaseError>;

    async fn interaction_stats(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InteractionStats>, DatabaseError>;

    // ── System logs ─────────────────────────────────────────────────

    async fn insert_system_log(&self, log: &SystemLog) -> Result<(), DatabaseError>;

    async fn list_logs(&self, query: &LogQuery) -> Result<Page<SystemLog>, DatabaseError>;

    async fn count_logs(
        &self,
        since: Option<DateTime<Utc>>,
        errors_only: bool,
    ) -> Result<u64, DatabaseError>;
}
