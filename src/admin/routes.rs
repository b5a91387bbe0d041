//! Admin-only dashboard, user management, and log inspection endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::audit::{LogCategory, LogLevel};
use crate::auth::token::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::{LogQuery, UserQuery};

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
struct UsersQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_users_per_page")]
    per_page: u32,
    #[serde(default)]
    verified: Option<bool>,
    #[serde(default)]
    search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_users_per_page() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_logs_per_page")]
    per_page: u32,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

fn default_logs_per_page() -> u32 {
    100
}

fn rate_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

/// GET /api/admin/dashboard
///
/// Operational overview for the last `days` days (default 7).
async fn dashboard(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Value>> {
    let days = query.days.clamp(1, 365);
    let since = Some(Utc::now() - Duration::days(days));

    let total_users = state.db.count_users(None, false).await?;
    let verified_users = state.db.count_users(None, true).await?;
    let new_users = state.db.count_users(since, false).await?;

    let total_sessions = state.db.count_sessions(None, false).await?;
    let completed_sessions = state.db.count_sessions(None, true).await?;
    let recent_sessions = state.db.count_sessions(since, false).await?;

    let ai_stats = state.db.interaction_stats(since).await?;
    let total_interactions: u64 = ai_stats.iter().map(|s| s.count).sum();
    let total_ai_cost: Decimal = ai_stats.iter().map(|s| s.total_cost_usd).sum();

    let total_documents = state.db.count_documents(None).await?;
    let recent_documents = state.db.count_documents(since).await?;

    let total_logs = state.db.count_logs(since, false).await?;
    let error_logs = state.db.count_logs(since, true).await?;

    state
        .audit
        .record(
            crate::audit::SystemLog::new(
                LogLevel::Info,
                LogCategory::System,
                "admin_dashboard_viewed",
            )
            .with_user(&admin.user.id),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "dashboard": {
            "period_days": days,
            "timestamp": Utc::now(),
            "users": {
                "total": total_users,
                "verified": verified_users,
                "verification_rate": rate_percent(verified_users, total_users),
                "new_users": new_users,
            },
            "onboarding": {
                "total_sessions": total_sessions,
                "completed_sessions": completed_sessions,
                "completion_rate": rate_percent(completed_sessions, total_sessions),
                "recent_sessions": recent_sessions,
            },
            "ai_analytics": {
                "total_interactions": total_interactions,
                "interactions_by_type": ai_stats,
                "total_cost_usd": total_ai_cost.round_dp(6),
            },
            "documents": {
                "total_generated": total_documents,
                "recent_generated": recent_documents,
            },
            "error_metrics": {
                "error_count": error_logs,
                "total_logs": total_logs,
                "error_rate_percent": rate_percent(error_logs, total_logs),
            },
        },
    })))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UsersQuery>,
) -> ApiResult<Json<Value>> {
    let users = state
        .db
        .list_users(&UserQuery {
            page: query.page.max(1),
            per_page: query.per_page.clamp(1, 100),
            verified: query.verified,
            search: query.search.filter(|s| !s.trim().is_empty()),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "users": users.items.iter().map(|u| u.to_json()).collect::<Vec<_>>(),
        "pagination": {
            "page": users.page,
            "per_page": users.per_page,
            "total": users.total,
            "pages": users.total_pages(),
        },
    })))
}

/// GET /api/admin/users/{user_id}
///
/// Full picture of a single user: sessions, documents, recent AI usage.
async fn user_details(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or(ApiError::NotFound { entity: "User" })?;

    let sessions = state.db.sessions_for_user(&user.id).await?;
    let documents = state.db.documents_for_user(&user.id, 1, 50).await?;
    let interactions = state.db.interactions_for_user(&user.id, 1, 10).await?;

    let total_ai_cost: Decimal = interactions
        .items
        .iter()
        .filter_map(|i| i.cost_usd)
        .sum();

    Ok(Json(json!({
        "success": true,
        "user_details": {
            "user": user.to_json(),
            "onboarding_sessions": sessions.iter().map(|s| s.to_json()).collect::<Vec<_>>(),
            "documents": documents.items.iter().map(|d| d.to_json()).collect::<Vec<_>>(),
            "ai_interactions": interactions.items.iter().map(|i| i.to_json()).collect::<Vec<_>>(),
            "statistics": {
                "total_sessions": sessions.len(),
                "total_documents": documents.total,
                "total_ai_interactions": interactions.total,
                "recent_ai_cost_usd": total_ai_cost.round_dp(6),
            },
        },
    })))
}

/// GET /api/admin/logs
async fn list_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Value>> {
    let logs = state
        .db
        .list_logs(&LogQuery {
            page: query.page.max(1),
            per_page: query.per_page.clamp(1, 1000),
            level: query.level.as_deref().map(LogLevel::parse),
            category: query.category.as_deref().map(LogCategory::parse),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "logs": logs.items.iter().map(|l| l.to_json()).collect::<Vec<_>>(),
        "pagination": {
            "page": logs.page,
            "per_page": logs.per_page,
            "total": logs.total,
            "pages": logs.total_pages(),
        },
    })))
}

/// Build the admin routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{user_id}", get(user_details))
        .route("/api/admin/logs", get(list_logs))
}
