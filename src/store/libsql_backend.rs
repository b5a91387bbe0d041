//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and safe
//! for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params, params_from_iter};
use rust_decimal::Decimal;
use tracing::info;

use crate::ai::model::{AiInteraction, Feedback, InteractionKind};
use crate::audit::{LogCategory, LogLevel, SystemLog};
use crate::auth::user::User;
use crate::comms::model::{Communication, CommunicationKind, CommunicationStatus};
use crate::documents::model::{Document, DocumentStatus, TemplateType};
use crate::error::DatabaseError;
use crate::onboarding::session::{OnboardingSession, PlanType, SessionStatus};
use crate::store::traits::{Database, InteractionStats, LogQuery, Page, UserQuery};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    phone_number TEXT NOT NULL UNIQUE,
    email TEXT,
    first_name TEXT,
    last_name TEXT,
    is_verified INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_admin INTEGER NOT NULL DEFAULT 0,
    verification_attempts INTEGER NOT NULL DEFAULT 0,
    last_verification_attempt TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_login TEXT
);

CREATE TABLE IF NOT EXISTS onboarding_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    plan_type TEXT NOT NULL DEFAULT 'basic',
    status TEXT NOT NULL DEFAULT 'initiated',
    current_step INTEGER NOT NULL DEFAULT 0,
    total_steps INTEGER NOT NULL DEFAULT 4,
    steps_completed TEXT NOT NULL DEFAULT '[]',
    verification_request_id TEXT,
    video_session_id TEXT,
    video_token TEXT,
    ai_recommendations TEXT NOT NULL DEFAULT '{}',
    personalization_score REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON onboarding_sessions(user_id, created_at);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    template_type TEXT NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    file_path TEXT,
    file_size INTEGER,
    download_url TEXT,
    operations_applied TEXT NOT NULL DEFAULT '[]',
    email_sent INTEGER NOT NULL DEFAULT 0,
    email_recipient TEXT,
    delivery_attempts INTEGER NOT NULL DEFAULT 0,
    ai_generated_content TEXT NOT NULL DEFAULT '{}',
    personalization_applied INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    processed_at TEXT,
    delivered_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id, created_at);

CREATE TABLE IF NOT EXISTS communications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    kind TEXT NOT NULL,
    channel TEXT NOT NULL,
    recipient TEXT NOT NULL,
    subject TEXT,
    message TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    external_id TEXT,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    ai_optimized INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    sent_at TEXT,
    delivered_at TEXT
);

CREATE TABLE IF NOT EXISTS ai_interactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    kind TEXT NOT NULL,
    input TEXT NOT NULL,
    output TEXT NOT NULL,
    model TEXT NOT NULL,
    confidence REAL,
    processing_time_ms INTEGER,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd TEXT,
    context TEXT NOT NULL DEFAULT '{}',
    feedback TEXT,
    feedback_details TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interactions_user ON ai_interactions(user_id, created_at);

CREATE TABLE IF NOT EXISTS system_logs (
    id TEXT PRIMARY KEY,
    level TEXT NOT NULL,
    category TEXT NOT NULL,
    message TEXT NOT NULL,
    user_id TEXT,
    session_id TEXT,
    request_id TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_created ON system_logs(created_at);
"#;

const USER_COLUMNS: &str = "id, phone_number, email, first_name, last_name, is_verified, \
     is_active, is_admin, verification_attempts, last_verification_attempt, \
     created_at, updated_at, last_login";

const SESSION_COLUMNS: &str = "id, user_id, plan_type, status, current_step, total_steps, \
     steps_completed, verification_request_id, video_session_id, video_token, \
     ai_recommendations, personalization_score, created_at, updated_at, completed_at";

const DOCUMENT_COLUMNS: &str = "id, user_id, template_type, title, status, file_path, file_size, \
     download_url, operations_applied, email_sent, email_recipient, delivery_attempts, \
     ai_generated_content, personalization_applied, created_at, processed_at, delivered_at";

const INTERACTION_COLUMNS: &str = "id, user_id, kind, input, output, model, confidence, \
     processing_time_ms, prompt_tokens, completion_tokens, cost_usd, context, feedback, \
     feedback_details, created_at";

const LOG_COLUMNS: &str =
    "id, level, category, message, user_id, session_id, request_id, metadata, created_at";

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and create the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to open libSQL database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Create all tables. Idempotent.
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_datetime(&s))
}

fn fmt_optional_datetime(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|d| d.to_rfc3339())
}

fn parse_json(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or(serde_json::Value::Null)
}

fn parse_string_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    Ok(User {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        is_verified: row.get::<i64>(5)? != 0,
        is_active: row.get::<i64>(6)? != 0,
        is_admin: row.get::<i64>(7)? != 0,
        verification_attempts: row.get::<i64>(8)? as u32,
        last_verification_attempt: parse_optional_datetime(row.get(9)?),
        created_at: parse_datetime(&row.get::<String>(10)?),
        updated_at: parse_datetime(&row.get::<String>(11)?),
        last_login: parse_optional_datetime(row.get(12)?),
    })
}

fn row_to_session(row: &libsql::Row) -> Result<OnboardingSession, libsql::Error> {
    Ok(OnboardingSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_type: PlanType::parse(&row.get::<String>(2)?),
        status: SessionStatus::parse(&row.get::<String>(3)?),
        current_step: row.get::<i64>(4)? as u32,
        total_steps: row.get::<i64>(5)? as u32,
        steps_completed: parse_string_list(&row.get::<String>(6)?),
        verification_request_id: row.get(7)?,
        video_session_id: row.get(8)?,
        video_token: row.get(9)?,
        ai_recommendations: parse_json(&row.get::<String>(10)?),
        personalization_score: row.get(11)?,
        created_at: parse_datetime(&row.get::<String>(12)?),
        updated_at: parse_datetime(&row.get::<String>(13)?),
        completed_at: parse_optional_datetime(row.get(14)?),
    })
}

fn row_to_document(row: &libsql::Row) -> Result<Document, libsql::Error> {
    Ok(Document {
        id: row.get(0)?,
        user_id: row.get(1)?,
        template_type: TemplateType::parse(&row.get::<String>(2)?)
            .unwrap_or(TemplateType::WelcomePacket),
        title: row.get(3)?,
        status: DocumentStatus::parse(&row.get::<String>(4)?),
        file_path: row.get(5)?,
        file_size: row.get::<Option<i64>>(6)?.map(|n| n as u64),
        download_url: row.get(7)?,
        operations_applied: parse_string_list(&row.get::<String>(8)?),
        email_sent: row.get::<i64>(9)? != 0,
        email_recipient: row.get(10)?,
        delivery_attempts: row.get::<i64>(11)? as u32,
        ai_generated_content: parse_json(&row.get::<String>(12)?),
        personalization_applied: row.get::<i64>(13)? != 0,
        created_at: parse_datetime(&row.get::<String>(14)?),
        processed_at: parse_optional_datetime(row.get(15)?),
        delivered_at: parse_optional_datetime(row.get(16)?),
    })
}

fn row_to_interaction(row: &libsql::Row) -> Result<AiInteraction, libsql::Error> {
    Ok(AiInteraction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: InteractionKind::parse(&row.get::<String>(2)?),
        input: parse_json(&row.get::<String>(3)?),
        output: parse_json(&row.get::<String>(4)?),
        model: row.get(5)?,
        confidence: row.get(6)?,
        processing_time_ms: row.get::<Option<i64>>(7)?.map(|n| n as u64),
        prompt_tokens: row.get::<i64>(8)? as u32,
        completion_tokens: row.get::<i64>(9)? as u32,
        cost_usd: row
            .get::<Option<String>>(10)?
            .and_then(|s| s.parse::<Decimal>().ok()),
        context: parse_json(&row.get::<String>(11)?),
        feedback: row
            .get::<Option<String>>(12)?
            .and_then(|s| Feedback::parse(&s)),
        feedback_details: row.get(13)?,
        created_at: parse_datetime(&row.get::<String>(14)?),
    })
}

fn row_to_log(row: &libsql::Row) -> Result<SystemLog, libsql::Error> {
    Ok(SystemLog {
        id: row.get(0)?,
        level: LogLevel::parse(&row.get::<String>(1)?),
        category: LogCategory::parse(&row.get::<String>(2)?),
        message: row.get(3)?,
        user_id: row.get(4)?,
        session_id: row.get(5)?,
        request_id: row.get(6)?,
        metadata: parse_json(&row.get::<String>(7)?),
        created_at: parse_datetime(&row.get::<String>(8)?),
    })
}

fn comm_kind_to_str(kind: &CommunicationKind) -> &'static str {
    kind.as_str()
}

fn comm_status_to_str(status: &CommunicationStatus) -> &'static str {
    status.as_str()
}

fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

#[async_trait]
impl Database for LibSqlBackend {
    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    user.id.clone(),
                    user.phone_number.clone(),
                    user.email.clone(),
                    user.first_name.clone(),
                    user.last_name.clone(),
                    user.is_verified as i64,
                    user.is_active as i64,
                    user.is_admin as i64,
                    i64::from(user.verification_attempts),
                    fmt_optional_datetime(&user.last_verification_attempt),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                    fmt_optional_datetime(&user.last_login),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                params![id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_user(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?"),
                params![phone],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_user(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE users SET email = ?, first_name = ?, last_name = ?, is_verified = ?, \
                 is_active = ?, is_admin = ?, verification_attempts = ?, \
                 last_verification_attempt = ?, updated_at = ?, last_login = ? WHERE id = ?",
                params![
                    user.email.clone(),
                    user.first_name.clone(),
                    user.last_name.clone(),
                    user.is_verified as i64,
                    user.is_active as i64,
                    user.is_admin as i64,
                    i64::from(user.verification_attempts),
                    fmt_optional_datetime(&user.last_verification_attempt),
                    user.updated_at.to_rfc3339(),
                    fmt_optional_datetime(&user.last_login),
                    user.id.clone(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, DatabaseError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();

        if let Some(verified) = query.verified {
            clauses.push("is_verified = ?".into());
            values.push(libsql::Value::from(verified as i64));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            clauses.push(
                "(phone_number LIKE ? OR email LIKE ? OR first_name LIKE ? OR last_name LIKE ?)"
                    .into(),
            );
            let pattern = format!("%{search}%");
            for _ in 0..4 {
                values.push(libsql::Value::from(pattern.clone()));
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut count_rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM users{where_sql}"),
                params_from_iter(values.clone()),
            )
            .await
            .map_err(query_err)?;
        let total = match count_rows.next().await.map_err(query_err)? {
            Some(row) => row.get::<i64>(0).map_err(query_err)? as u64,
            None => 0,
        };

        values.push(libsql::Value::from(i64::from(query.per_page)));
        values.push(libsql::Value::from(page_offset(query.page, query.per_page)));
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users{where_sql} \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                params_from_iter(values),
            )
            .await
            .map_err(query_err)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            items.push(row_to_user(&row).map_err(query_err)?);
        }
        Ok(Page {
            items,
            page: query.page,
            per_page: query.per_page,
            total,
        })
    }

    async fn count_users(
        &self,
        since: Option<DateTime<Utc>>,
        verified_only: bool,
    ) -> Result<u64, DatabaseError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();
        if verified_only {
            clauses.push("is_verified = 1");
        }
        if let Some(since) = since {
            clauses.push("created_at >= ?");
            values.push(libsql::Value::from(since.to_rfc3339()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM users{where_sql}"),
                params_from_iter(values),
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(query_err)? as u64),
            None => Ok(0),
        }
    }

    // ── Onboarding sessions ─────────────────────────────────────────

    async fn insert_session(&self, session: &OnboardingSession) -> Result<(), DatabaseError> {
        let steps = serde_json::to_string(&session.steps_completed)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let recs = serde_json::to_string(&session.ai_recommendations)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO onboarding_sessions ({SESSION_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    session.id.clone(),
                    session.user_id.clone(),
                    session.plan_type.as_str(),
                    session.status.as_str(),
                    i64::from(session.current_step),
                    i64::from(session.total_steps),
                    steps,
                    session.verification_request_id.clone(),
                    session.video_session_id.clone(),
                    session.video_token.clone(),
                    recs,
                    session.personalization_score,
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                    fmt_optional_datetime(&session.completed_at),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<OnboardingSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM onboarding_sessions WHERE id = ?"),
                params![id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_session(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn update_session(&self, session: &OnboardingSession) -> Result<(), DatabaseError> {
        let steps = serde_json::to_string(&session.steps_completed)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let recs = serde_json::to_string(&session.ai_recommendations)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "UPDATE onboarding_sessions SET plan_type = ?, status = ?, current_step = ?, \
                 total_steps = ?, steps_completed = ?, verification_request_id = ?, \
                 video_session_id = ?, video_token = ?, ai_recommendations = ?, \
                 personalization_score = ?, updated_at = ?, completed_at = ? WHERE id = ?",
                params![
                    session.plan_type.as_str(),
                    session.status.as_str(),
                    i64::from(session.current_step),
                    i64::from(session.total_steps),
                    steps,
                    session.verification_request_id.clone(),
                    session.video_session_id.clone(),
                    session.video_token.clone(),
                    recs,
                    session.personalization_score,
                    session.updated_at.to_rfc3339(),
                    fmt_optional_datetime(&session.completed_at),
                    session.id.clone(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn latest_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM onboarding_sessions WHERE user_id = ? \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![user_id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_session(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM onboarding_sessions WHERE user_id = ? \
                     AND status IN ('initiated', 'in_progress') \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![user_id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_session(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<OnboardingSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM onboarding_sessions WHERE user_id = ? \
                     ORDER BY created_at DESC"
                ),
                params![user_id],
            )
            .await
            .map_err(query_err)?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            sessions.push(row_to_session(&row).map_err(query_err)?);
        }
        Ok(sessions)
    }

    async fn count_sessions(
        &self,
        since: Option<DateTime<Utc>>,
        completed_only: bool,
    ) -> Result<u64, DatabaseError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();
        if completed_only {
            clauses.push("status = 'completed'");
        }
        if let Some(since) = since {
            clauses.push("created_at >= ?");
            values.push(libsql::Value::from(since.to_rfc3339()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM onboarding_sessions{where_sql}"),
                params_from_iter(values),
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(query_err)? as u64),
            None => Ok(0),
        }
    }

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, document: &Document) -> Result<(), DatabaseError> {
        let operations = serde_json::to_string(&document.operations_applied)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let ai_content = serde_json::to_string(&document.ai_generated_content)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO documents ({DOCUMENT_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    document.id.clone(),
                    document.user_id.clone(),
                    document.template_type.as_str(),
                    document.title.clone(),
                    document.status.as_str(),
                    document.file_path.clone(),
                    document.file_size.map(|n| n as i64),
                    document.download_url.clone(),
                    operations,
                    document.email_sent as i64,
                    document.email_recipient.clone(),
                    i64::from(document.delivery_attempts),
                    ai_content,
                    document.personalization_applied as i64,
                    document.created_at.to_rfc3339(),
                    fmt_optional_datetime(&document.processed_at),
                    fmt_optional_datetime(&document.delivered_at),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"),
                params![id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_document(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn update_document(&self, document: &Document) -> Result<(), DatabaseError> {
        let operations = serde_json::to_string(&document.operations_applied)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let ai_content = serde_json::to_string(&document.ai_generated_content)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "UPDATE documents SET status = ?, file_path = ?, file_size = ?, \
                 download_url = ?, operations_applied = ?, email_sent = ?, \
                 email_recipient = ?, delivery_attempts = ?, ai_generated_content = ?, \
                 personalization_applied = ?, processed_at = ?, delivered_at = ? WHERE id = ?",
                params![
                    document.status.as_str(),
                    document.file_path.clone(),
                    document.file_size.map(|n| n as i64),
                    document.download_url.clone(),
                    operations,
                    document.email_sent as i64,
                    document.email_recipient.clone(),
                    i64::from(document.delivery_attempts),
                    ai_content,
                    document.personalization_applied as i64,
                    fmt_optional_datetime(&document.processed_at),
                    fmt_optional_datetime(&document.delivered_at),
                    document.id.clone(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn documents_for_user(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Document>, DatabaseError> {
        let mut count_rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM documents WHERE user_id = ?",
                params![user_id],
            )
            .await
            .map_err(query_err)?;
        let total = match count_rows.next().await.map_err(query_err)? {
            Some(row) => row.get::<i64>(0).map_err(query_err)? as u64,
            None => 0,
        };

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                params![user_id, i64::from(per_page), page_offset(page, per_page)],
            )
            .await
            .map_err(query_err)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            items.push(row_to_document(&row).map_err(query_err)?);
        }
        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    async fn count_documents(&self, since: Option<DateTime<Utc>>) -> Result<u64, DatabaseError> {
        let (sql, values) = match since {
            Some(since) => (
                "SELECT COUNT(*) FROM documents WHERE created_at >= ?".to_string(),
                vec![libsql::Value::from(since.to_rfc3339())],
            ),
            None => ("SELECT COUNT(*) FROM documents".to_string(), Vec::new()),
        };
        let mut rows = self
            .conn()
            .query(&sql, params_from_iter(values))
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(query_err)? as u64),
            None => Ok(0),
        }
    }

    // ── Communications ──────────────────────────────────────────────

    async fn insert_communication(&self, comm: &Communication) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO communications (id, user_id, kind, channel, recipient, subject, \
                 message, status, external_id, error_message, retry_count, ai_optimized, \
                 created_at, sent_at, delivered_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    comm.id.clone(),
                    comm.user_id.clone(),
                    comm_kind_to_str(&comm.kind),
                    comm.channel.clone(),
                    comm.recipient.clone(),
                    comm.subject.clone(),
                    comm.message.clone(),
                    comm_status_to_str(&comm.status),
                    comm.external_id.clone(),
                    comm.error_message.clone(),
                    i64::from(comm.retry_count),
                    comm.ai_optimized as i64,
                    comm.created_at.to_rfc3339(),
                    fmt_optional_datetime(&comm.sent_at),
                    fmt_optional_datetime(&comm.delivered_at),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn update_communication(&self, comm: &Communication) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE communications SET status = ?, external_id = ?, error_message = ?, \
                 retry_count = ?, sent_at = ?, delivered_at = ? WHERE id = ?",
                params![
                    comm_status_to_str(&comm.status),
                    comm.external_id.clone(),
                    comm.error_message.clone(),
                    i64::from(comm.retry_count),
                    fmt_optional_datetime(&comm.sent_at),
                    fmt_optional_datetime(&comm.delivered_at),
                    comm.id.clone(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    // ── AI interactions ─────────────────────────────────────────────

    async fn insert_interaction(&self, interaction: &AiInteraction) -> Result<(), DatabaseError> {
        let input = serde_json::to_string(&interaction.input)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let output = serde_json::to_string(&interaction.output)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let context = serde_json::to_string(&interaction.context)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO ai_interactions ({INTERACTION_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    interaction.id.clone(),
                    interaction.user_id.clone(),
                    interaction.kind.as_str(),
                    input,
                    output,
                    interaction.model.clone(),
                    interaction.confidence,
                    interaction.processing_time_ms.map(|n| n as i64),
                    i64::from(interaction.prompt_tokens),
                    i64::from(interaction.completion_tokens),
                    interaction.cost_usd.map(|d| d.to_string()),
                    context,
                    interaction.feedback.map(|f| f.as_str()),
                    interaction.feedback_details.clone(),
                    interaction.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_interaction(&self, id: &str) -> Result<Option<AiInteraction>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {INTERACTION_COLUMNS} FROM ai_interactions WHERE id = ?"),
                params![id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_interaction(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn update_interaction_feedback(
        &self,
        id: &str,
        feedback: Feedback,
        details: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE ai_interactions SET feedback = ?, feedback_details = ? WHERE id = ?",
                params![feedback.as_str(), details.map(str::to_string), id],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "ai_interaction".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn interactions_for_user(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<AiInteraction>, DatabaseError> {
        let mut count_rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM ai_interactions WHERE user_id = ?",
                params![user_id],
            )
            .await
            .map_err(query_err)?;
        let total = match count_rows.next().await.map_err(query_err)? {
            Some(row) => row.get::<i64>(0).map_err(query_err)? as u64,
            None => 0,
        };

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {INTERACTION_COLUMNS} FROM ai_interactions WHERE user_id = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                params![user_id, i64::from(per_page), page_offset(page, per_page)],
            )
            .await
            .map_err(query_err)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            items.push(row_to_interaction(&row).map_err(query_err)?);
        }
        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    async fn interaction_stats(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InteractionStats>, DatabaseError> {
        let (where_sql, values) = match since {
            Some(since) => (
                " WHERE created_at >= ?".to_string(),
                vec![libsql::Value::from(since.to_rfc3339())],
            ),
            None => (String::new(), Vec::new()),
        };
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT kind, COUNT(*), AVG(processing_time_ms), \
                     COALESCE(SUM(CAST(cost_usd AS REAL)), 0.0) \
                     FROM ai_interactions{where_sql} GROUP BY kind ORDER BY kind"
                ),
                params_from_iter(values),
            )
            .await
            .map_err(query_err)?;

        let mut stats = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let total_cost: f64 = row.get(3).map_err(query_err)?;
            stats.push(InteractionStats {
                kind: row.get(0).map_err(query_err)?,
                count: row.get::<i64>(1).map_err(query_err)? as u64,
                avg_processing_time_ms: row.get(2).map_err(query_err)?,
                total_cost_usd: Decimal::try_from(total_cost)
                    .unwrap_or_default()
                    .round_dp(6),
            });
        }
        Ok(stats)
    }

    // ── System logs ─────────────────────────────────────────────────

    async fn insert_system_log(&self, log: &SystemLog) -> Result<(), DatabaseError> {
        let metadata = serde_json::to_string(&log.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO system_logs ({LOG_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    log.id.clone(),
                    log.level.as_str(),
                    log.category.as_str(),
                    log.message.clone(),
                    log.user_id.clone(),
                    log.session_id.clone(),
                    log.request_id.clone(),
                    metadata,
                    log.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_logs(&self, query: &LogQuery) -> Result<Page<SystemLog>, DatabaseError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();
        if let Some(level) = query.level {
            clauses.push("level = ?");
            values.push(libsql::Value::from(level.as_str().to_string()));
        }
        if let Some(category) = query.category {
            clauses.push("category = ?");
            values.push(libsql::Value::from(category.as_str().to_string()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut count_rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM system_logs{where_sql}"),
                params_from_iter(values.clone()),
            )
            .await
            .map_err(query_err)?;
        let total = match count_rows.next().await.map_err(query_err)? {
            Some(row) => row.get::<i64>(0).map_err(query_err)? as u64,
            None => 0,
        };

        values.push(libsql::Value::from(i64::from(query.per_page)));
        values.push(libsql::Value::from(page_offset(query.page, query.per_page)));
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM system_logs{where_sql} \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                params_from_iter(values),
            )
            .await
            .map_err(query_err)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            items.push(row_to_log(&row).map_err(query_err)?);
        }
        Ok(Page {
            items,
            page: query.page,
            per_page: query.per_page,
            total,
        })
    }

    async fn count_logs(
        &self,
        since: Option<DateTime<Utc>>,
        errors_only: bool,
    ) -> Result<u64, DatabaseError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();
        if errors_only {
            clauses.push("level IN ('error', 'critical')");
        }
        if let Some(since) = since {
            clauses.push("created_at >= ?");
            values.push(libsql::Value::from(since.to_rfc3339()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM system_logs{where_sql}"),
                params_from_iter(values),
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(query_err)? as u64),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn sample_user(phone: &str) -> User {
        let mut user = User::new(phone);
        user.first_name = Some("Ada".into());
        user.email = Some("ada@example.com".into());
        user
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let db = backend().await;
        let user = sample_user("+15551230001");
        db.insert_user(&user).await.unwrap();

        let loaded = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.phone_number, "+15551230001");
        assert_eq!(loaded.first_name.as_deref(), Some("Ada"));
        assert!(!loaded.is_verified);

        let by_phone = db.get_user_by_phone("+15551230001").await.unwrap();
        assert!(by_phone.is_some());
        assert!(db.get_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_persists_verification() {
        let db = backend().await;
        let mut user = sample_user("+15551230002");
        db.insert_user(&user).await.unwrap();

        user.record_verification_attempt();
        user.mark_verified();
        db.update_user(&user).await.unwrap();

        let loaded = db.get_user(&user.id).await.unwrap().unwrap();
        assert!(loaded.is_verified);
        assert_eq!(loaded.verification_attempts, 0);
        assert!(loaded.last_login.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let db = backend().await;
        db.insert_user(&sample_user("+15551230003")).await.unwrap();
        let result = db.insert_user(&sample_user("+15551230003")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_round_trip_and_active_lookup() {
        let db = backend().await;
        let user = sample_user("+15551230004");
        db.insert_user(&user).await.unwrap();

        let mut session = OnboardingSession::new(&user.id, PlanType::Premium, 4);
        session.ai_recommendations = json!({"recommended_steps": ["welcome_video_call"]});
        db.insert_session(&session).await.unwrap();

        let active = db.active_session_for_user(&user.id).await.unwrap().unwrap();
        assert_eq!(active.id, session.id);
        assert_eq!(active.plan_type, PlanType::Premium);

        session.complete_step("welcome_video_call");
        db.update_session(&session).await.unwrap();
        let loaded = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, 1);
        assert_eq!(loaded.steps_completed, vec!["welcome_video_call"]);
        assert_eq!(loaded.status, SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn test_completed_session_not_active() {
        let db = backend().await;
        let user = sample_user("+15551230005");
        db.insert_user(&user).await.unwrap();

        let mut session = OnboardingSession::new(&user.id, PlanType::Basic, 1);
        session.complete_step("only_step");
        db.insert_session(&session).await.unwrap();

        assert!(db.active_session_for_user(&user.id).await.unwrap().is_none());
        assert!(db.latest_session_for_user(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_document_pagination() {
        let db = backend().await;
        let user = sample_user("+15551230006");
        db.insert_user(&user).await.unwrap();

        for i in 0..5 {
            let doc = Document::new(
                &user.id,
                TemplateType::Contract,
                &format!("Contract {i}"),
            );
            db.insert_document(&doc).await.unwrap();
        }

        let page = db.documents_for_user(&user.id, 1, 2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_interaction_feedback() {
        let db = backend().await;
        let user = sample_user("+15551230007");
        db.insert_user(&user).await.unwrap();

        let interaction = AiInteraction::new(
            &user.id,
            InteractionKind::Chatbot,
            json!({"message": "hi"}),
            json!({"response": "hello"}),
            "gpt-4",
        );
        db.insert_interaction(&interaction).await.unwrap();

        db.update_interaction_feedback(&interaction.id, Feedback::Positive, Some("helpful"))
            .await
            .unwrap();
        let loaded = db.get_interaction(&interaction.id).await.unwrap().unwrap();
        assert_eq!(loaded.feedback, Some(Feedback::Positive));
        assert_eq!(loaded.feedback_details.as_deref(), Some("helpful"));

        let missing = db
            .update_interaction_feedback("nope", Feedback::Negative, None)
            .await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_interaction_stats_groups_by_kind() {
        let db = backend().await;
        let user = sample_user("+15551230008");
        db.insert_user(&user).await.unwrap();

        for kind in [InteractionKind::Chatbot, InteractionKind::Chatbot, InteractionKind::FraudDetection] {
            let interaction = AiInteraction::new(&user.id, kind, json!({}), json!({}), "gpt-4")
                .with_processing_time(100);
            db.insert_interaction(&interaction).await.unwrap();
        }

        let stats = db.interaction_stats(None).await.unwrap();
        let chatbot = stats.iter().find(|s| s.kind == "chatbot").unwrap();
        assert_eq!(chatbot.count, 2);
        assert_eq!(chatbot.avg_processing_time_ms, Some(100.0));
    }

    #[tokio::test]
    async fn test_log_listing_filters() {
        let db = backend().await;
        db.insert_system_log(&SystemLog::new(LogLevel::Info, LogCategory::Auth, "a"))
            .await
            .unwrap();
        db.insert_system_log(&SystemLog::new(LogLevel::Error, LogCategory::Ai, "b"))
            .await
            .unwrap();

        let errors = db
            .list_logs(&LogQuery {
                page: 1,
                per_page: 10,
                level: Some(LogLevel::Error),
                category: None,
            })
            .await
            .unwrap();
        assert_eq!(errors.total, 1);
        assert_eq!(errors.items[0].message, "b");

        assert_eq!(db.count_logs(None, true).await.unwrap(), 1);
        assert_eq!(db.count_logs(None, false).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_user_listing_search() {
        let db = backend().await;
        let mut ada = sample_user("+15551230009");
        ada.mark_verified();
        db.insert_user(&ada).await.unwrap();
        let mut bob = User::new("+15551230010");
        bob.first_name = Some("Bob".into());
        db.insert_user(&bob).await.unwrap();

        let found = db
            .list_users(&UserQuery {
                page: 1,
                per_page: 10,
                verified: None,
                search: Some("Ada".into()),
            })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].id, ada.id);

        let verified = db
            .list_users(&UserQuery {
                page: 1,
                per_page: 10,
                verified: Some(true),
                search: None,
            })
            .await
            .unwrap();
        assert_eq!(verified.total, 1);
    }
}
