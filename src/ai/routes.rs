//! REST endpoints for the AI features.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::ai::model::Feedback;
use crate::ai::personalization::AiOutcome;
use crate::auth::token::AuthUser;
use crate::error::{ApiError, ApiResult, DatabaseError};
use crate::onboarding::session::PlanType;
use crate::state::AppState;

const MAX_CHAT_MESSAGE_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
struct PersonalizeRequest {
    #[serde(default)]
    plan_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OptimizeRequest {
    communication_type: String,
    #[serde(default)]
    context: Value,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct FraudRequest {
    context: Value,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    context: Value,
}

#[derive(Debug, Deserialize)]
struct EndChatRequest {
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct InteractionsQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    interaction_id: String,
    feedback: String,
    #[serde(default)]
    details: Option<String>,
}

fn outcome_body(outcome: &AiOutcome, key: &str) -> Value {
    json!({
        "success": outcome.success,
        key: outcome.data,
        "interaction_id": outcome.interaction_id,
        "processing_time_ms": outcome.processing_time_ms,
    })
}

/// POST /api/ai/personalize-onboarding
async fn personalize_onboarding(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PersonalizeRequest>,
) -> ApiResult<Json<Value>> {
    let plan_type = match body.plan_type.as_deref() {
        None => PlanType::Basic,
        Some(raw @ ("basic" | "premium")) => PlanType::parse(raw),
        Some(_) => {
            return Err(ApiError::Validation(
                "plan_type must be basic or premium".into(),
            ));
        }
    };

    let outcome = state
        .personalization
        .personalize_onboarding(&auth.user, plan_type)
        .await;
    Ok(Json(outcome_body(&outcome, "personalization")))
}

/// POST /api/ai/optimize-communication
async fn optimize_communication(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<OptimizeRequest>,
) -> ApiResult<Json<Value>> {
    if !matches!(
        body.communication_type.as_str(),
        "sms" | "email" | "push" | "voice"
    ) {
        return Err(ApiError::Validation(
            "communication_type must be one of sms, email, push, voice".into(),
        ));
    }

    let outcome = state
        .personalization
        .optimize_communication(&auth.user, &body.communication_type, &body.context)
        .await;
    Ok(Json(outcome_body(&outcome, "content")))
}

/// POST /api/ai/analyze-behavior
async fn analyze_behavior(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AnalyzeRequest>,
) -> ApiResult<Json<Value>> {
    let session = state
        .db
        .get_session(&body.session_id)
        .await?
        .filter(|s| s.user_id == auth.user.id)
        .ok_or(ApiError::NotFound {
            entity: "Onboarding session",
        })?;

    let outcome = state
        .personalization
        .analyze_behavior(&auth.user, &session)
        .await;
    Ok(Json(outcome_body(&outcome, "analysis")))
}

/// POST /api/ai/detect-fraud
async fn detect_fraud(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FraudRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .personalization
        .detect_fraud(&auth.user, &body.context)
        .await;
    Ok(Json(outcome_body(&outcome, "fraud_assessment")))
}

/// POST /api/ai/chatbot
async fn chatbot(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    if body.message.trim().is_empty() {
        return Err(ApiError::Validation("message is required".into()));
    }
    if body.message.len() > MAX_CHAT_MESSAGE_LEN {
        return Err(ApiError::Validation(format!(
            "message must be at most {MAX_CHAT_MESSAGE_LEN} characters"
        )));
    }

    let reply = state
        .chatbot
        .chat(&auth.user, &body.message, body.conversation_id, &body.context)
        .await;

    Ok(Json(json!({
        "success": reply.success,
        "response": reply.response,
        "conversation_id": reply.conversation_id,
        "interaction_id": reply.interaction_id,
        "processing_time_ms": reply.processing_time_ms,
    })))
}

/// POST /api/ai/chatbot/end
///
/// Drops the conversation history. `ended` is false when the conversation
/// was unknown or already ended.
async fn end_chat(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(body): Json<EndChatRequest>,
) -> ApiResult<Json<Value>> {
    let ended = state.chatbot.end_conversation(&body.conversation_id).await;
    Ok(Json(json!({
        "success": true,
        "ended": ended,
    })))
}

/// GET /api/ai/interactions
async fn list_interactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InteractionsQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 50);

    let interactions = state
        .db
        .interactions_for_user(&auth.user.id, page, per_page)
        .await?;

    Ok(Json(json!({
        "success": true,
        "interactions": interactions.items.iter().map(|i| i.to_json()).collect::<Vec<_>>(),
        "pagination": {
            "page": interactions.page,
            "per_page": interactions.per_page,
            "total": interactions.total,
            "pages": interactions.total_pages(),
        },
    })))
}

/// POST /api/ai/feedback
async fn submit_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FeedbackRequest>,
) -> ApiResult<Json<Value>> {
    let feedback = Feedback::parse(&body.feedback).ok_or_else(|| {
        ApiError::Validation("feedback must be positive, negative, or neutral".into())
    })?;

    // Feedback only applies to the caller's own interactions.
    let owned = state
        .db
        .get_interaction(&body.interaction_id)
        .await?
        .filter(|i| i.user_id == auth.user.id)
        .is_some();
    if !owned {
        return Err(ApiError::NotFound {
            entity: "AI interaction",
        });
    }

    match state
        .db
        .update_interaction_feedback(&body.interaction_id, feedback, body.details.as_deref())
        .await
    {
        Ok(()) => {}
        Err(DatabaseError::NotFound { .. }) => {
            return Err(ApiError::NotFound {
                entity: "AI interaction",
            });
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Json(json!({
        "success": true,
        "message": "Feedback submitted successfully",
    })))
}

/// Build the AI feature routes.
pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ai/personalize-onboarding", post(personalize_onboarding))
        .route("/api/ai/optimize-communication", post(optimize_communication))
        .route("/api/ai/analyze-behavior", post(analyze_behavior))
        .route("/api/ai/detect-fraud", post(detect_fraud))
        .route("/api/ai/chatbot", post(chatbot))
        .route("/api/ai/chatbot/end", post(end_chat))
        .route("/api/ai/interactions", get(list_interactions))
        .route("/api/ai/feedback", post(submit_feedback))
}
