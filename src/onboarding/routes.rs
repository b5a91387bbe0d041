//! Onboarding flow endpoints: session lifecycle, video, and SMS steps.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::audit::LogCategory;
use crate::auth::token::AuthUser;
use crate::auth::user::User;
use crate::comms::{Communication, CommunicationKind};
use crate::error::{ApiError, ApiResult};
use crate::onboarding::session::{OnboardingSession, PlanType, SessionStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    plan_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendSmsRequest {
    #[serde(default)]
    message_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteStepRequest {
    step_name: String,
}

fn require_verified(user: &User) -> ApiResult<()> {
    if !user.is_verified {
        return Err(ApiError::Validation(
            "User must be verified to start onboarding".into(),
        ));
    }
    Ok(())
}

async fn active_session(state: &AppState, user_id: &str) -> ApiResult<OnboardingSession> {
    state
        .db
        .active_session_for_user(user_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Active onboarding session",
        })
}

/// POST /api/onboarding/start
///
/// Starts a personalized onboarding session. An already-active session is
/// returned as-is rather than replaced. The AI recommendation drives the
/// step count; its fallback applies when no provider is configured.
async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<StartRequest>,
) -> ApiResult<Json<Value>> {
    require_verified(&auth.user)?;
    let plan_type = match body.plan_type.as_deref() {
        None => PlanType::Basic,
        Some(raw @ ("basic" | "premium")) => PlanType::parse(raw),
        Some(_) => {
            return Err(ApiError::Validation(
                "plan_type must be basic or premium".into(),
            ));
        }
    };

    if let Some(existing) = state.db.active_session_for_user(&auth.user.id).await? {
        return Ok(Json(json!({
            "success": true,
            "session": existing.to_json(),
            "message": "Existing onboarding session found",
        })));
    }

    let outcome = state
        .personalization
        .personalize_onboarding(&auth.user, plan_type)
        .await;
    let recommended_steps = outcome
        .data
        .get("recommended_steps")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0) as u32;

    let mut session = OnboardingSession::new(&auth.user.id, plan_type, recommended_steps);
    session.status = SessionStatus::InProgress;
    session.ai_recommendations = outcome.data.clone();
    session.personalization_score = outcome
        .data
        .get("personalization_score")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    state.db.insert_session(&session).await?;

    state
        .audit
        .onboarding_event("onboarding_started", &auth.user.id, &session.id)
        .await;

    Ok(Json(json!({
        "success": true,
        "session": session.to_json(),
        "ai_recommendations": outcome.data,
        "message": format!("Personalized onboarding started for {} plan", plan_type.as_str()),
    })))
}

/// POST /api/onboarding/video-session
///
/// Creates a Vonage Video session for the active onboarding and records the
/// `video_session_created` step.
async fn video_session(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let mut session = active_session(&state, &auth.user.id).await?;

    let video = match state.vonage.create_video_session().await {
        Ok(video) => video,
        Err(e) => {
            state
                .audit
                .vendor_failure(LogCategory::Onboarding, "vonage", &e.to_string())
                .await;
            return Err(e.into());
        }
    };

    session.video_session_id = Some(video.session_id.clone());
    session.video_token = Some(video.token.clone());
    session.complete_step("video_session_created");
    state.db.update_session(&session).await?;

    state
        .audit
        .onboarding_event("video_session_created", &auth.user.id, &session.id)
        .await;

    Ok(Json(json!({
        "success": true,
        "video_session": {
            "session_id": video.session_id,
            "token": video.token,
            "api_key": state.config.vonage.video_api_key,
        },
        "message": "Video session created successfully",
    })))
}

/// POST /api/onboarding/send-sms
///
/// Sends an AI-personalized SMS, falling back to canned copy, and records
/// the `sms_sent` step plus a communication row.
async fn send_sms(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SendSmsRequest>,
) -> ApiResult<Json<Value>> {
    let mut session = active_session(&state, &auth.user.id).await?;
    let message_type = body.message_type.unwrap_or_else(|| "welcome".to_string());

    let context = json!({
        "plan_type": session.plan_type,
        "current_step": session.current_step,
        "message_type": message_type,
    });
    let outcome = state
        .personalization
        .optimize_communication(&auth.user, "sms", &context)
        .await;
    let content = outcome
        .data
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "Hi {}! Welcome to OnboardIQ. Complete your setup to get started. \
                 Reply STOP to opt out.",
                auth.user.display_name()
            )
        });

    let mut comm = Communication::new(
        &auth.user.id,
        CommunicationKind::Sms,
        "vonage_sms",
        &auth.user.phone_number,
    );
    comm.message = Some(content.clone());
    comm.ai_optimized = outcome.success;

    let sms = match state.vonage.send_sms(&auth.user.phone_number, &content).await {
        Ok(sms) => sms,
        Err(e) => {
            comm.mark_failed(&e.to_string());
            state.db.insert_communication(&comm).await?;
            state
                .audit
                .vendor_failure(LogCategory::Communication, "vonage", &e.to_string())
                .await;
            return Err(e.into());
        }
    };

    comm.mark_sent(Some(sms.message_id.clone()));
    state.db.insert_communication(&comm).await?;

    session.complete_step("sms_sent");
    state.db.update_session(&session).await?;

    state
        .audit
        .onboarding_event("sms_sent", &auth.user.id, &session.id)
        .await;

    Ok(Json(json!({
        "success": true,
        "message_id": sms.message_id,
        "content": content,
        "message": "SMS sent successfully",
    })))
}

/// POST /api/onboarding/complete-step
async fn complete_step(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CompleteStepRequest>,
) -> ApiResult<Json<Value>> {
    if body.step_name.trim().is_empty() {
        return Err(ApiError::Validation("step_name is required".into()));
    }

    let mut session = active_session(&state, &auth.user.id).await?;
    session.complete_step(&body.step_name);
    state.db.update_session(&session).await?;

    state
        .audit
        .onboarding_event("step_completed", &auth.user.id, &session.id)
        .await;

    Ok(Json(json!({
        "success": true,
        "session": session.to_json(),
        "message": format!("Step \"{}\" completed successfully", body.step_name),
    })))
}

/// GET /api/onboarding/status
///
/// Latest session for the caller, with a behavior analysis while it is
/// still in progress.
async fn status(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let Some(session) = state.db.latest_session_for_user(&auth.user.id).await? else {
        return Ok(Json(json!({
            "user_id": auth.user.id,
            "status": "not_started",
            "message": "No onboarding session found",
        })));
    };

    let ai_analysis = if session.status == SessionStatus::InProgress {
        let outcome = state
            .personalization
            .analyze_behavior(&auth.user, &session)
            .await;
        Some(outcome.data)
    } else {
        None
    };

    Ok(Json(json!({
        "user_id": auth.user.id,
        "session": session.to_json(),
        "ai_analysis": ai_analysis,
    })))
}

/// Build the onboarding routes.
pub fn onboarding_routes() -> Router<AppState> {
    Router::new()
        .route("/api/onboarding/start", post(start))
        .route("/api/onboarding/video-session", post(video_session))
        .route("/api/onboarding/send-sms", post(send_sms))
        .route("/api/onboarding/complete-step", post(complete_step))
        .route("/api/onboarding/status", get(status))
}
