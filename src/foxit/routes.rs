//! Direct Foxit API surface: document generation, PDF workflows, and the
//! composed packet operations.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::foxit::workflow::WorkflowConfig;
use crate::foxit::PacketUserData;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct GenerateDocumentRequest {
    template_id: String,
    data: Value,
    #[serde(default)]
    output_format: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRequest {
    document_urls: Vec<String>,
    #[serde(default)]
    workflow_config: Option<WorkflowConfig>,
}

#[derive(Debug, Deserialize)]
struct WelcomePacketRequest {
    name: String,
    company: String,
    plan: String,
    email: String,
    phone: String,
    #[serde(default)]
    account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OnboardingGuideRequest {
    name: String,
    company: String,
    plan: String,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceRequest {
    invoice_number: String,
    customer_name: String,
    company_name: String,
    plan_name: String,
    amount: f64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    documents: Vec<GenerateDocumentRequest>,
}

fn validate_output_format(format: &str) -> ApiResult<()> {
    if !matches!(format, "pdf" | "docx" | "html") {
        return Err(ApiError::Validation(
            "output_format must be one of pdf, docx, html".into(),
        ));
    }
    Ok(())
}

/// GET /api/foxit/health
async fn health(State(state): State<AppState>) -> Json<Value> {
    let health = state.foxit.health_check().await;
    Json(json!({
        "success": true,
        "service": "foxit",
        "health": health,
        "timestamp": Utc::now(),
    }))
}

/// GET /api/foxit/templates
async fn templates(State(state): State<AppState>) -> Json<Value> {
    let info = state.foxit.template_info();
    Json(json!({
        "success": true,
        "templates": info["templates"],
        "api_base_url": info["api_base_url"],
        "endpoints": info["endpoints"],
        "status": info["status"],
        "timestamp": Utc::now(),
    }))
}

/// POST /api/foxit/generate-document
async fn generate_document(
    State(state): State<AppState>,
    Json(body): Json<GenerateDocumentRequest>,
) -> ApiResult<Json<Value>> {
    if body.template_id.is_empty() {
        return Err(ApiError::Validation("template_id is required".into()));
    }
    let output_format = body.output_format.as_deref().unwrap_or("pdf");
    validate_output_format(output_format)?;

    let document = state
        .foxit
        .generate_document(&body.template_id, &body.data, output_format)
        .await?;

    Ok(Json(json!({
        "success": true,
        "document_url": document.document_url,
        "document_id": document.document_id,
        "file_size": document.file_size,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/foxit/process-pdf-workflow
async fn process_pdf_workflow(
    State(state): State<AppState>,
    Json(body): Json<WorkflowRequest>,
) -> ApiResult<Json<Value>> {
    if body.document_urls.is_empty() {
        return Err(ApiError::Validation(
            "document_urls must not be empty".into(),
        ));
    }
    let config = body.workflow_config.unwrap_or_default();

    let result = state
        .foxit
        .process_pdf_workflow(&body.document_urls, &config)
        .await?;

    Ok(Json(json!({
        "success": true,
        "final_document_url": result.final_document_url,
        "workflow_id": result.workflow_id,
        "processing_time": result.processing_time,
        "file_size": result.file_size,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/foxit/create-welcome-packet
async fn create_welcome_packet(
    State(state): State<AppState>,
    Json(body): Json<WelcomePacketRequest>,
) -> ApiResult<Json<Value>> {
    if body.name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }

    let user_data = PacketUserData {
        name: Some(body.name),
        company: Some(body.company),
        plan: Some(body.plan),
        email: Some(body.email),
        phone: Some(body.phone),
        account_id: body.account_id,
    };
    let packet = state.foxit.create_welcome_packet(&user_data).await?;

    Ok(Json(json!({
        "success": true,
        "final_document_url": packet.final_document_url,
        "welcome_document_url": packet.welcome_document_url,
        "contract_document_url": packet.contract_document_url,
        "workflow_id": packet.workflow_id,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/foxit/create-onboarding-guide
async fn create_onboarding_guide(
    State(state): State<AppState>,
    Json(body): Json<OnboardingGuideRequest>,
) -> ApiResult<Json<Value>> {
    let user_data = PacketUserData {
        name: Some(body.name),
        company: Some(body.company),
        plan: Some(body.plan),
        ..Default::default()
    };
    let document = state
        .foxit
        .create_onboarding_guide(&user_data, &body.features)
        .await?;

    Ok(Json(json!({
        "success": true,
        "document_url": document.document_url,
        "document_id": document.document_id,
        "file_size": document.file_size,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/foxit/create-invoice
async fn create_invoice(
    State(state): State<AppState>,
    Json(body): Json<InvoiceRequest>,
) -> ApiResult<Json<Value>> {
    if body.amount < 0.0 {
        return Err(ApiError::Validation("amount must not be negative".into()));
    }
    let currency = body.currency.as_deref().unwrap_or("USD");
    if !matches!(currency, "USD" | "EUR" | "GBP") {
        return Err(ApiError::Validation(
            "currency must be one of USD, EUR, GBP".into(),
        ));
    }

    let billing_data = json!({
        "invoice_number": body.invoice_number,
        "customer_name": body.customer_name,
        "company_name": body.company_name,
        "plan_name": body.plan_name,
        "amount": body.amount,
        "currency": currency,
        "due_date": body.due_date.unwrap_or_default(),
        "items": body.items,
    });
    let document = state.foxit.create_invoice(&billing_data).await?;

    Ok(Json(json!({
        "success": true,
        "document_url": document.document_url,
        "document_id": document.document_id,
        "file_size": document.file_size,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/foxit/batch-generate
///
/// Per-document failures do not abort the batch; the result lists each
/// outcome with its caller-supplied `request_id`.
async fn batch_generate(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> ApiResult<Json<Value>> {
    if body.documents.is_empty() {
        return Err(ApiError::Validation(
            "No documents specified for batch generation".into(),
        ));
    }

    let total = body.documents.len();
    let mut results = Vec::with_capacity(total);
    for doc_request in body.documents {
        let request_id = doc_request
            .request_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let output_format = doc_request.output_format.as_deref().unwrap_or("pdf");

        if doc_request.template_id.is_empty() || validate_output_format(output_format).is_err() {
            results.push(json!({
                "request_id": request_id,
                "success": false,
                "error": "Invalid document request",
            }));
            continue;
        }

        match state
            .foxit
            .generate_document(&doc_request.template_id, &doc_request.data, output_format)
            .await
        {
            Ok(document) => results.push(json!({
                "request_id": request_id,
                "success": true,
                "document_url": document.document_url,
            })),
            Err(e) => results.push(json!({
                "request_id": request_id,
                "success": false,
                "error": "Document generation failed",
                "details": e.vendor_message(),
            })),
        }
    }

    let successful = results
        .iter()
        .filter(|r| r["success"] == json!(true))
        .count();
    Ok(Json(json!({
        "success": true,
        "batch_results": results,
        "total_documents": total,
        "successful_documents": successful,
        "failed_documents": total - successful,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/foxit/workflow-templates
///
/// Canned workflow configurations for the common processing chains.
async fn workflow_templates() -> Json<Value> {
    Json(json!({
        "success": true,
        "workflow_templates": {
            "welcome_packet": {
                "name": "Welcome Packet",
                "description": "Generate welcome letter and contract, merge, compress, and watermark",
                "steps": ["merge", "compress", "watermark"],
                "config": {
                    "compress": true,
                    "compression_level": "high",
                    "watermark": {
                        "type": "text",
                        "text": "Prepared for {{customer_name}}",
                        "opacity": 0.3,
                        "rotation": 45,
                        "position": "center",
                    },
                },
            },
            "contract_package": {
                "name": "Contract Package",
                "description": "Generate contract with terms, compress and secure",
                "steps": ["compress", "secure"],
                "config": {
                    "compress": true,
                    "compression_level": "medium",
                    "add_security": {
                        "permissions": ["print"],
                        "encryption_level": "256",
                    },
                },
            },
            "invoice_package": {
                "name": "Invoice Package",
                "description": "Generate invoice with watermark and compression",
                "steps": ["watermark", "compress"],
                "config": {
                    "compress": true,
                    "compression_level": "high",
                    "watermark": {
                        "type": "text",
                        "text": "INVOICE",
                        "opacity": 0.2,
                        "rotation": 0,
                        "position": "top-right",
                    },
                },
            },
        },
        "timestamp": Utc::now(),
    }))
}

/// Build the Foxit routes.
pub fn foxit_routes() -> Router<AppState> {
    Router::new()
        .route("/api/foxit/health", get(health))
        .route("/api/foxit/templates", get(templates))
        .route("/api/foxit/generate-document", post(generate_document))
        .route("/api/foxit/process-pdf-workflow", post(process_pdf_workflow))
        .route("/api/foxit/create-welcome-packet", post(create_welcome_packet))
        .route("/api/foxit/create-onboarding-guide", post(create_onboarding_guide))
        .route("/api/foxit/create-invoice", post(create_invoice))
        .route("/api/foxit/batch-generate", post(batch_generate))
        .route("/api/foxit/workflow-templates", get(workflow_templates))
}
