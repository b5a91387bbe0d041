//! Document generation, listing, and download endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::audit::LogCategory;
use crate::auth::token::AuthUser;
use crate::comms::{Communication, CommunicationKind};
use crate::documents::model::{Document, DocumentStatus, TemplateType};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    template_type: String,
    #[serde(default)]
    user_data: Value,
    #[serde(default = "default_true")]
    ai_personalization: bool,
    #[serde(default)]
    send_email: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ListQuery {
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

fn template_id(state: &AppState, template_type: TemplateType) -> String {
    let templates = &state.config.foxit.templates;
    match template_type {
        TemplateType::WelcomePacket => templates.welcome_packet.clone(),
        TemplateType::Contract => templates.contract.clone(),
        TemplateType::UserGuide => templates.user_guide.clone(),
        TemplateType::Invoice => templates.invoice.clone(),
    }
}

/// POST /api/documents/generate
///
/// Generates a personalized document through Foxit, optionally enriched
/// with AI copy and delivered by email.
async fn generate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<GenerateRequest>,
) -> ApiResult<Json<Value>> {
    let template_type = TemplateType::parse(&body.template_type)
        .filter(|t| {
            matches!(
                t,
                TemplateType::WelcomePacket | TemplateType::Contract | TemplateType::UserGuide
            )
        })
        .ok_or_else(|| {
            ApiError::Validation(
                "template_type must be one of welcome_packet, contract, user_guide".into(),
            )
        })?;

    let mut doc_data = json!({
        "user_id": auth.user.id,
        "phone_number": auth.user.phone_number,
        "email": auth.user.email,
        "first_name": auth.user.first_name,
        "last_name": auth.user.last_name,
        "customer_name": auth.user.display_name(),
        "generated_at": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    });
    if let (Some(base), Some(extra)) = (doc_data.as_object_mut(), body.user_data.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }

    let mut ai_content = json!({});
    let mut personalization_applied = false;
    if body.ai_personalization {
        let context = json!({
            "template_type": template_type,
            "user_data": doc_data,
        });
        let outcome = state
            .personalization
            .optimize_communication(&auth.user, "document", &context)
            .await;
        if outcome.success {
            ai_content = outcome.data;
            personalization_applied = true;
        }
    }
    if let (Some(base), Some(extra)) = (doc_data.as_object_mut(), ai_content.as_object()) {
        for (key, value) in extra {
            base.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    let generated = match state
        .foxit
        .generate_document(&template_id(&state, template_type), &doc_data, "pdf")
        .await
    {
        Ok(generated) => generated,
        Err(e) => {
            state
                .audit
                .vendor_failure(LogCategory::Document, "foxit", &e.to_string())
                .await;
            return Err(e.into());
        }
    };

    let title = format!(
        "{} - {}",
        template_type.default_title(),
        auth.user.display_name()
    );
    let mut document = Document::new(&auth.user.id, template_type, &title);
    document.status = DocumentStatus::Generated;
    document.download_url = Some(generated.document_url.clone());
    document.file_size = generated.file_size;
    document.ai_generated_content = ai_content;
    document.personalization_applied = personalization_applied;

    // Keep a local copy so the download endpoint can serve the file. If this
    // fails the download endpoint falls back to the vendor URL.
    match store_document_file(&state, &document.id, &generated.document_url).await {
        Ok((file_path, file_size)) => {
            document.file_path = Some(file_path);
            document.file_size = Some(file_size);
        }
        Err(e) => {
            tracing::warn!(error = %e, document_id = %document.id, "Failed to store document file");
        }
    }

    if body.send_email {
        if let Some(recipient) = auth.user.email.clone() {
            deliver_by_email(&state, &auth, &mut document, &generated.document_url, &recipient)
                .await?;
        }
    }

    state.db.insert_document(&document).await?;
    state
        .audit
        .record(
            crate::audit::SystemLog::new(
                crate::audit::LogLevel::Info,
                LogCategory::Document,
                "document_generated",
            )
            .with_user(&auth.user.id)
            .with_metadata(json!({
                "document_id": document.id,
                "template_type": template_type,
            })),
        )
        .await;

    let download_url = format!("/api/documents/download/{}", document.id);
    Ok(Json(json!({
        "success": true,
        "document": document.to_json(),
        "download_url": download_url,
        "message": "Document generated successfully",
    })))
}

/// Fetch the generated file and write it under the documents directory.
/// Returns the stored path and byte size.
async fn store_document_file(
    state: &AppState,
    document_id: &str,
    document_url: &str,
) -> Result<(String, u64), String> {
    let bytes = state
        .foxit
        .download_document(document_url)
        .await
        .map_err(|e| e.to_string())?;

    let dir = std::path::Path::new(&state.config.documents_dir);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| e.to_string())?;
    let path = dir.join(format!("{document_id}.pdf"));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| e.to_string())?;

    Ok((path.to_string_lossy().into_owned(), bytes.len() as u64))
}

async fn deliver_by_email(
    state: &AppState,
    auth: &AuthUser,
    document: &mut Document,
    document_url: &str,
    recipient: &str,
) -> ApiResult<()> {
    let subject = format!("Your {} from OnboardIQ", document.title);
    let body = format!(
        "Hi {},\n\nYour {} is ready. Download it here:\n{}\n\nThe OnboardIQ Team",
        auth.user.display_name(),
        document.title,
        document_url
    );

    let mut comm = Communication::new(&auth.user.id, CommunicationKind::Email, "smtp", recipient);
    comm.subject = Some(subject.clone());
    comm.message = Some(body.clone());

    document.delivery_attempts += 1;
    document.email_recipient = Some(recipient.to_string());

    match state.email.send(recipient, &subject, &body).await {
        Ok(()) => {
            comm.mark_sent(None);
            document.email_sent = true;
            document.status = DocumentStatus::Delivered;
            document.delivered_at = Some(Utc::now());
        }
        Err(e) => {
            // Email delivery is best effort; the document itself succeeded.
            comm.mark_failed(&e.to_string());
            tracing::warn!(error = %e, "Document email delivery failed");
        }
    }
    state.db.insert_communication(&comm).await?;
    Ok(())
}

/// GET /api/documents/download/{document_id}
///
/// Serves the caller's own document as a PDF attachment. When the local file
/// is missing the client is redirected to the vendor URL instead.
async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(document_id): Path<String>,
) -> ApiResult<Response> {
    let document = state
        .db
        .get_document(&document_id)
        .await?
        .filter(|d| d.user_id == auth.user.id)
        .ok_or(ApiError::NotFound { entity: "Document" })?;

    let local = match document.file_path.as_deref() {
        Some(file_path) => tokio::fs::read(file_path).await.ok(),
        None => None,
    };
    let Some(bytes) = local else {
        if let Some(url) = document.download_url.as_deref() {
            return Ok(Redirect::temporary(url).into_response());
        }
        return Err(ApiError::NotFound {
            entity: "Document file",
        });
    };

    let disposition = format!("attachment; filename=\"{}.pdf\"", document.title);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/documents/list
async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 50);

    let documents = state
        .db
        .documents_for_user(&auth.user.id, page, per_page)
        .await?;

    Ok(Json(json!({
        "success": true,
        "documents": documents.items.iter().map(|d| d.to_json()).collect::<Vec<_>>(),
        "pagination": {
            "page": documents.page,
            "per_page": documents.per_page,
            "total": documents.total,
            "pages": documents.total_pages(),
        },
    })))
}

/// GET /api/documents/templates
async fn templates() -> Json<Value> {
    Json(json!({
        "success": true,
        "templates": [
            {
                "id": "welcome_packet",
                "name": "Welcome Packet",
                "description": "Personalized welcome packet for new users",
                "ai_enhanced": true,
            },
            {
                "id": "contract",
                "name": "Service Contract",
                "description": "Service agreement contract",
                "ai_enhanced": true,
            },
            {
                "id": "user_guide",
                "name": "User Guide",
                "description": "Personalized user guide and instructions",
                "ai_enhanced": true,
            },
        ],
    }))
}

/// Build the document routes.
pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/documents/generate", post(generate))
        .route("/api/documents/download/{document_id}", get(download))
        .route("/api/documents/list", get(list))
        .route("/api/documents/templates", get(templates))
}
