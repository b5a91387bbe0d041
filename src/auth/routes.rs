//! Phone-verification signup and JWT session endpoints.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::audit::LogCategory;
use crate::auth::phone;
use crate::auth::token::{AuthUser, claims_summary};
use crate::auth::user::User;
use crate::error::{ApiError, ApiResult, AuthError};
use crate::state::AppState;

/// How long a Verify code stays valid, in seconds.
const CODE_EXPIRES_IN: u32 = 300;

#[derive(Debug, Deserialize)]
struct SignupRequest {
    phone_number: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyCodeRequest {
    verification_request_id: String,
    code: String,
    phone_number: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    phone_number: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ResendRequest {
    phone_number: String,
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    verification_request_id: String,
    phone_number: String,
}

fn validate_name(name: &Option<String>, field: &str) -> ApiResult<()> {
    if let Some(value) = name {
        if value.len() > 50 {
            return Err(ApiError::Validation(format!(
                "{field} must be at most 50 characters"
            )));
        }
    }
    Ok(())
}

/// POST /api/auth/signup
///
/// Creates (or re-uses an unverified) user and sends a Verify code. A phone
/// number that is already verified is a conflict.
async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> ApiResult<Json<Value>> {
    let phone_number =
        phone::normalize(&body.phone_number).map_err(|e| ApiError::Validation(e.to_string()))?;
    validate_name(&body.first_name, "first_name")?;
    validate_name(&body.last_name, "last_name")?;

    let mut user = match state.db.get_user_by_phone(&phone_number).await? {
        Some(existing) if existing.is_verified => {
            state
                .audit
                .auth_event("signup_duplicate_verified", Some(&existing.id))
                .await;
            return Err(ApiError::Conflict(
                "This phone number is already registered and verified".into(),
            ));
        }
        Some(existing) => existing,
        None => {
            let mut user = User::new(&phone_number);
            user.email = body.email.clone();
            user.first_name = body.first_name.clone();
            user.last_name = body.last_name.clone();
            state.db.insert_user(&user).await?;
            user
        }
    };

    if !user.can_attempt_verification() {
        state
            .audit
            .auth_event("signup_rate_limited", Some(&user.id))
            .await;
        return Err(ApiError::TooManyAttempts(
            "Please wait before requesting another verification code".into(),
        ));
    }

    let verification = match state.vonage.start_verification(&phone_number).await {
        Ok(v) => v,
        Err(e) => {
            state
                .audit
                .vendor_failure(LogCategory::Auth, "vonage", &e.to_string())
                .await;
            return Err(e.into());
        }
    };

    user.record_verification_attempt();
    state.db.update_user(&user).await?;
    state
        .audit
        .auth_event("signup_verification_sent", Some(&user.id))
        .await;

    Ok(Json(json!({
        "success": true,
        "verification_request_id": verification.request_id,
        "user_id": user.id,
        "message": "Verification code sent to your phone",
        "expires_in": CODE_EXPIRES_IN,
    })))
}

/// POST /api/auth/verify-code
///
/// Checks the SMS code, marks the user verified, and returns a token pair.
async fn verify_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeRequest>,
) -> ApiResult<Json<Value>> {
    if body.code.len() != 6 || !body.code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation("code must be 6 digits".into()));
    }
    let phone_number =
        phone::normalize(&body.phone_number).map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut user = state
        .db
        .get_user_by_phone(&phone_number)
        .await?
        .ok_or(ApiError::NotFound { entity: "User" })?;

    let accepted = state
        .vonage
        .check_verification(&body.verification_request_id, &body.code)
        .await?;
    if !accepted {
        state
            .audit
            .auth_event("verify_code_failed", Some(&user.id))
            .await;
        return Err(ApiError::Validation(
            "The verification code is incorrect or expired".into(),
        ));
    }

    user.mark_verified();
    state.db.update_user(&user).await?;

    let tokens = state.tokens.issue_pair(&user)?;
    state
        .audit
        .auth_event("verify_code_success", Some(&user.id))
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Phone number verified successfully",
        "user": user.to_json(),
        "tokens": tokens,
    })))
}

/// POST /api/auth/login
///
/// Phone-number login for already-verified users.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let phone_number =
        phone::normalize(&body.phone_number).map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut user = match state.db.get_user_by_phone(&phone_number).await? {
        Some(user) if user.is_verified => user,
        _ => {
            state.audit.auth_event("login_failed", None).await;
            return Err(ApiError::Unauthorized(
                "Invalid phone number or user not verified".into(),
            ));
        }
    };

    if !user.is_active {
        state
            .audit
            .auth_event("login_failed_account_disabled", Some(&user.id))
            .await;
        return Err(ApiError::Forbidden(
            "Your account has been disabled. Please contact support.".into(),
        ));
    }

    user.record_login();
    state.db.update_user(&user).await?;

    let tokens = state.tokens.issue_pair(&user)?;
    state.audit.auth_event("login_success", Some(&user.id)).await;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "user": user.to_json(),
        "tokens": tokens,
    })))
}

/// POST /api/auth/refresh
///
/// Trades a refresh token for a fresh access token.
async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<Value>> {
    let claims = state.tokens.verify_refresh(&body.refresh_token)?;
    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InvalidToken)?;

    let access_token = state.tokens.issue_access(&user)?;
    state
        .audit
        .auth_event("token_refreshed", Some(&user.id))
        .await;

    Ok(Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": state.tokens.access_expiry_secs(),
    })))
}

/// POST /api/auth/logout
///
/// Stateless tokens: logout is an audit event, the client drops its tokens.
async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    state.audit.auth_event("logout", Some(&auth.user.id)).await;
    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully",
    })))
}

/// GET /api/auth/status
async fn status(auth: AuthUser) -> Json<Value> {
    Json(json!({
        "authenticated": true,
        "user": auth.user.to_json(),
        "token_info": claims_summary(&auth.claims),
    }))
}

/// POST /api/auth/resend-verification
async fn resend_verification(
    State(state): State<AppState>,
    Json(body): Json<ResendRequest>,
) -> ApiResult<Json<Value>> {
    let phone_number =
        phone::normalize(&body.phone_number).map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut user = state
        .db
        .get_user_by_phone(&phone_number)
        .await?
        .ok_or(ApiError::NotFound { entity: "User" })?;

    if user.is_verified {
        return Err(ApiError::Validation("User already verified".into()));
    }
    if !user.can_attempt_verification() {
        return Err(ApiError::TooManyAttempts(
            "Please wait before requesting another verification code".into(),
        ));
    }

    let verification = state.vonage.start_verification(&phone_number).await?;

    user.record_verification_attempt();
    state.db.update_user(&user).await?;
    state
        .audit
        .auth_event("verification_resent", Some(&user.id))
        .await;

    Ok(Json(json!({
        "success": true,
        "verification_request_id": verification.request_id,
        "message": "Verification code resent",
        "expires_in": CODE_EXPIRES_IN,
    })))
}

/// POST /api/auth/cancel-verification
///
/// Cancels an outstanding Verify request, e.g. when the user mistyped their
/// number and wants to restart signup.
async fn cancel_verification(
    State(state): State<AppState>,
    Json(body): Json<CancelRequest>,
) -> ApiResult<Json<Value>> {
    let phone_number =
        phone::normalize(&body.phone_number).map_err(|e| ApiError::Validation(e.to_string()))?;

    let user = state
        .db
        .get_user_by_phone(&phone_number)
        .await?
        .ok_or(ApiError::NotFound { entity: "User" })?;

    if user.is_verified {
        return Err(ApiError::Validation("User already verified".into()));
    }

    state
        .vonage
        .cancel_verification(&body.verification_request_id)
        .await?;
    state
        .audit
        .auth_event("verification_cancelled", Some(&user.id))
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Verification request cancelled",
    })))
}

/// Build the auth routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/verify-code", post(verify_code))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/status", get(status))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/cancel-verification", post(cancel_verification))
}
