//! End-to-end API tests over an in-memory database with mock vendors and
//! no LLM provider, so AI features exercise their fallbacks.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use onboardiq::documents::{Document, DocumentStatus, TemplateType};
use onboardiq::router::app_router;
use onboardiq::state::AppState;
use onboardiq::store::Database;

const PHONE: &str = "+15551234567";
const MOCK_CODE: &str = "123456";

async fn test_app() -> (Router, AppState) {
    let state = AppState::for_tests().await.unwrap();
    (app_router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Signup and verify a user, returning (access_token, user_id).
async fn verified_user(app: &Router, phone: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"phone_number": phone, "first_name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body}");
    let request_id = body["verification_request_id"].as_str().unwrap().to_string();
    let user_id = body["user_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        "POST",
        "/api/auth/verify-code",
        None,
        Some(json!({
            "verification_request_id": request_id,
            "code": MOCK_CODE,
            "phone_number": phone,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify failed: {body}");
    let token = body["tokens"]["access_token"].as_str().unwrap().to_string();
    (token, user_id)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _state) = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "onboardiq");
}

#[tokio::test]
async fn test_signup_verify_login_flow() {
    let (app, _state) = test_app().await;
    let (token, _user_id) = verified_user(&app, PHONE).await;

    // The access token works against the status endpoint.
    let (status, body) = send(&app, "GET", "/api/auth/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["phone_number"], PHONE);
    assert_eq!(body["user"]["is_verified"], true);

    // A verified user can log in again by phone alone.
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tokens"]["access_token"].as_str().is_some());

    // The refresh token trades for a new access token.
    let refresh = body["tokens"]["refresh_token"].as_str().unwrap();
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn test_wrong_verification_code_rejected() {
    let (app, _state) = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["verification_request_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/verify-code",
        None,
        Some(json!({
            "verification_request_id": request_id,
            "code": "000000",
            "phone_number": PHONE,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_duplicate_verified_signup_conflicts() {
    let (app, _state) = test_app().await;
    verified_user(&app, PHONE).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_unverified_login_unauthorized() {
    let (app, _state) = test_app().await;
    let (status, _body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_verification_attempts_exhaust_into_429() {
    let (app, _state) = test_app().await;
    let (status, _body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Four resends reach the five-attempt cap; the next one is blocked.
    for _ in 0..4 {
        let (status, _body) = send(
            &app,
            "POST",
            "/api/auth/resend-verification",
            None,
            Some(json!({"phone_number": PHONE})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/resend-verification",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_ATTEMPTS");
}

#[tokio::test]
async fn test_cancel_verification() {
    let (app, _state) = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"phone_number": PHONE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["verification_request_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/cancel-verification",
        None,
        Some(json!({
            "verification_request_id": request_id,
            "phone_number": PHONE,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    // Cancellation is only meaningful before verification.
    let (app, _state) = test_app().await;
    let (_token, _user_id) = verified_user(&app, PHONE).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/cancel-verification",
        None,
        Some(json!({
            "verification_request_id": "mock_verify_00000000",
            "phone_number": PHONE,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_onboarding_flow_with_fallback_personalization() {
    let (app, _state) = test_app().await;
    let (token, _user_id) = verified_user(&app, PHONE).await;

    // Start: the basic fallback flow has three steps.
    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/start",
        Some(&token),
        Some(json!({"plan_type": "basic"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "start failed: {body}");
    assert_eq!(body["session"]["total_steps"], 3);
    assert_eq!(body["session"]["status"], "in_progress");

    // Starting again returns the same session instead of a new one.
    let session_id = body["session"]["session_id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/start",
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["session_id"], session_id.as_str());
    assert_eq!(body["message"], "Existing onboarding session found");

    // Status includes a behavior analysis while in progress.
    let (status, body) = send(&app, "GET", "/api/onboarding/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ai_analysis"].is_object());

    // Complete all three steps; the session finishes.
    for step in ["welcome_sms", "basic_tour", "document_generation"] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/onboarding/complete-step",
            Some(&token),
            Some(json!({"step_name": step})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "step {step} failed: {body}");
    }

    let (status, body) = send(&app, "GET", "/api/onboarding/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["status"], "completed");
    assert_eq!(body["session"]["progress_percentage"], 100.0);
    assert!(body["session"]["completed_at"].is_string());
    assert!(body["ai_analysis"].is_null());
}

#[tokio::test]
async fn test_onboarding_sms_and_video_steps() {
    let (app, _state) = test_app().await;
    let (token, _user_id) = verified_user(&app, PHONE).await;

    let (status, _body) = send(
        &app,
        "POST",
        "/api/onboarding/start",
        Some(&token),
        Some(json!({"plan_type": "premium"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Mock SMS uses the fallback copy.
    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/send-sms",
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "send-sms failed: {body}");
    assert!(body["message_id"].as_str().unwrap().starts_with("mock_sms_"));
    assert!(body["content"].as_str().unwrap().contains("OnboardIQ"));

    // Mock video session records the video step.
    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/video-session",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "video-session failed: {body}");
    assert!(
        body["video_session"]["session_id"]
            .as_str()
            .unwrap()
            .starts_with("mock_session_")
    );

    let (status, body) = send(&app, "GET", "/api/onboarding/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let steps = body["session"]["steps_completed"].as_array().unwrap();
    assert!(steps.contains(&json!("sms_sent")));
    assert!(steps.contains(&json!("video_session_created")));
}

#[tokio::test]
async fn test_document_generation_and_listing() {
    let (app, _state) = test_app().await;
    let (token, _user_id) = verified_user(&app, PHONE).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/documents/generate",
        Some(&token),
        Some(json!({"template_type": "welcome_packet"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "generate failed: {body}");
    assert_eq!(body["document"]["template_type"], "welcome_packet");
    assert_eq!(body["document"]["status"], "generated");
    // A local copy is stored at generation time.
    assert!(body["document"]["file_path"].is_string());
    let document_id = body["document"]["document_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/api/documents/list", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["documents"][0]["document_id"], document_id.as_str());

    // The advertised download URL serves the stored file.
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/documents/download/{document_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF"));

    // Invalid template types are rejected.
    let (status, _body) = send(
        &app,
        "POST",
        "/api/documents/generate",
        Some(&token),
        Some(json!({"template_type": "invoice"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_document_download_serves_local_file() {
    let (app, state) = test_app().await;
    let (token, user_id) = verified_user(&app, PHONE).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"%PDF-1.4 test content").unwrap();

    let mut document = Document::new(&user_id, TemplateType::UserGuide, "Onboarding Guide");
    document.status = DocumentStatus::Generated;
    document.file_path = Some(file.path().to_string_lossy().into_owned());
    state.db.insert_document(&document).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/documents/download/{}", document.id))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Onboarding Guide.pdf\""
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"%PDF-1.4 test content");
}

#[tokio::test]
async fn test_document_download_redirects_without_local_file() {
    let (app, state) = test_app().await;
    let (token, user_id) = verified_user(&app, PHONE).await;

    let mut document = Document::new(&user_id, TemplateType::Contract, "Service Agreement");
    document.status = DocumentStatus::Generated;
    document.download_url = Some("https://docs.onboardiq.local/mock/abc.pdf".to_string());
    state.db.insert_document(&document).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/documents/download/{}", document.id))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://docs.onboardiq.local/mock/abc.pdf"
    );
}

#[tokio::test]
async fn test_foxit_workflow_endpoint() {
    let (app, _state) = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/foxit/process-pdf-workflow",
        None,
        Some(json!({
            "document_urls": ["https://example.com/a.pdf", "https://example.com/b.pdf"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["workflow_id"].as_str().unwrap().starts_with("mock_workflow_"));
    // Default config merges then compresses.
    assert!(
        body["final_document_url"]
            .as_str()
            .unwrap()
            .ends_with("compressed.pdf")
    );

    let (status, body) = send(
        &app,
        "POST",
        "/api/foxit/batch-generate",
        None,
        Some(json!({
            "documents": [
                {"request_id": "r1", "template_id": "template-welcome-123", "data": {}},
                {"request_id": "r2", "template_id": "", "data": {}},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_documents"], 2);
    assert_eq!(body["successful_documents"], 1);
    assert_eq!(body["failed_documents"], 1);
    assert_eq!(body["batch_results"][0]["request_id"], "r1");
    assert_eq!(body["batch_results"][0]["success"], true);
    assert_eq!(body["batch_results"][1]["success"], false);
}

#[tokio::test]
async fn test_chatbot_fallback_reply() {
    let (app, _state) = test_app().await;
    let (token, user_id) = verified_user(&app, PHONE).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/chatbot",
        Some(&token),
        Some(json!({"message": "how do I get my verification code?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], false);
    assert!(body["response"].as_str().unwrap().contains("6-digit code"));
    assert!(
        body["conversation_id"]
            .as_str()
            .unwrap()
            .starts_with(&format!("conv_{user_id}_"))
    );
}

#[tokio::test]
async fn test_chatbot_end_conversation() {
    let (app, _state) = test_app().await;
    let (token, _user_id) = verified_user(&app, PHONE).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/chatbot",
        Some(&token),
        Some(json!({"message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/chatbot/end",
        Some(&token),
        Some(json!({"conversation_id": conversation_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], true);

    // Ending again is a no-op.
    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/chatbot/end",
        Some(&token),
        Some(json!({"conversation_id": conversation_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], false);
}

#[tokio::test]
async fn test_ai_feedback_round_trip() {
    let (app, _state) = test_app().await;
    let (token, _user_id) = verified_user(&app, PHONE).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/personalize-onboarding",
        Some(&token),
        Some(json!({"plan_type": "premium"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["personalization"]["personalization_score"], 60);
    let interaction_id = body["interaction_id"].as_str().unwrap().to_string();

    let (status, _body) = send(
        &app,
        "POST",
        "/api/ai/feedback",
        Some(&token),
        Some(json!({"interaction_id": interaction_id, "feedback": "positive"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/ai/interactions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["pagination"]["total"].as_u64().unwrap() >= 1);

    // Feedback on someone else's (or a missing) interaction is a 404.
    let (status, _body) = send(
        &app,
        "POST",
        "/api/ai/feedback",
        Some(&token),
        Some(json!({"interaction_id": "missing", "feedback": "negative"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_gate_and_dashboard() {
    let (app, state) = test_app().await;
    let (token, user_id) = verified_user(&app, PHONE).await;

    // A plain user is rejected.
    let (status, body) = send(&app, "GET", "/api/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    // Promote the user and try again.
    let mut user = state.db.get_user(&user_id).await.unwrap().unwrap();
    user.is_admin = true;
    state.db.update_user(&user).await.unwrap();

    let (status, body) = send(&app, "GET", "/api/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["dashboard"]["users"]["total"], 1);
    assert_eq!(body["dashboard"]["users"]["verified"], 1);
    assert_eq!(body["dashboard"]["users"]["verification_rate"], 100.0);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/admin/users/{user_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_details"]["user"]["user_id"], user_id.as_str());

    let (status, body) = send(
        &app,
        "GET",
        "/api/admin/logs?category=auth",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["pagination"]["total"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_unauthenticated_requests_rejected() {
    let (app, _state) = test_app().await;

    for path in [
        "/api/onboarding/status",
        "/api/documents/list",
        "/api/ai/interactions",
        "/api/admin/dashboard",
    ] {
        let (status, body) = send(&app, "GET", path, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}: {body}");
    }
}
