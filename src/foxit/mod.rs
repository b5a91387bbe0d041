//! Foxit document generation and PDF services client.

pub mod routes;
pub mod workflow;

use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::FoxitConfig;
use crate::error::VendorError;
use crate::foxit::workflow::{WorkflowConfig, build_stages};

const DOCGEN_TIMEOUT: Duration = Duration::from_secs(30);
const WORKFLOW_TIMEOUT: Duration = Duration::from_secs(60);

/// Placeholder PDF served in mock mode so downloads stay functional.
const MOCK_PDF: &[u8] =
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

/// A successfully generated document.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub document_url: String,
    pub document_id: String,
    pub file_size: Option<u64>,
}

/// Result of a completed PDF workflow.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub final_document_url: String,
    pub workflow_id: String,
    pub processing_time: Option<f64>,
    pub file_size: Option<u64>,
}

/// A composed welcome packet: two generated documents run through the
/// compress/watermark/secure chain.
#[derive(Debug, Clone)]
pub struct WelcomePacket {
    pub final_document_url: String,
    pub welcome_document_url: String,
    pub contract_document_url: String,
    pub workflow_id: String,
}

/// Inputs for welcome-packet composition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacketUserData {
    pub name: Option<String>,
    pub company: Option<String>,
    pub plan: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub account_id: Option<String>,
}

pub struct FoxitClient {
    config: FoxitConfig,
    client: reqwest::Client,
}

fn vendor_err(reason: impl ToString) -> VendorError {
    VendorError::RequestFailed {
        vendor: "foxit".to_string(),
        reason: reason.to_string(),
    }
}

impl FoxitClient {
    pub fn new(config: FoxitConfig) -> Self {
        if !config.is_configured() {
            tracing::warn!("Foxit API key not set; running in mock mode");
        }
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_mock(&self) -> bool {
        !self.config.is_configured()
    }

    pub fn config(&self) -> &FoxitConfig {
        &self.config
    }

    fn docgen_endpoint(&self) -> String {
        format!("{}/docgen/v1/generate", self.config.base_url)
    }

    fn workflow_endpoint(&self) -> String {
        format!("{}/pdfservices/v1/workflow", self.config.base_url)
    }

    /// Generate a document from a template and merge data.
    pub async fn generate_document(
        &self,
        template_id: &str,
        data: &Value,
        output_format: &str,
    ) -> Result<GeneratedDocument, VendorError> {
        let Some(api_key) = self.config.api_key.as_ref() else {
            let id = Uuid::new_v4().to_string();
            tracing::debug!(template_id, "Mock document generated");
            return Ok(GeneratedDocument {
                document_url: format!("https://docs.onboardiq.local/mock/{id}.{output_format}"),
                document_id: id,
                file_size: Some(204_800),
            });
        };

        let payload = json!({
            "templateId": template_id,
            "outputFormat": output_format,
            "data": data,
            "options": {
                "includeMetadata": true,
                // Watermarks are applied in PDF processing, not at generation.
                "watermark": false,
            }
        });

        tracing::info!(template_id, "Generating document");
        let response = self
            .client
            .post(self.docgen_endpoint())
            .bearer_auth(api_key.expose_secret())
            .header("X-API-Version", "v1")
            .timeout(DOCGEN_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(vendor_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VendorError::Rejected {
                vendor: "foxit".to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct DocGenResponse {
            document_url: Option<String>,
            document_id: Option<String>,
            file_size: Option<u64>,
        }

        let parsed: DocGenResponse =
            response.json().await.map_err(|e| VendorError::InvalidResponse {
                vendor: "foxit".to_string(),
                reason: e.to_string(),
            })?;

        let document_url = parsed.document_url.ok_or_else(|| VendorError::InvalidResponse {
            vendor: "foxit".to_string(),
            reason: "missing documentUrl".to_string(),
        })?;

        Ok(GeneratedDocument {
            document_url,
            document_id: parsed
                .document_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            file_size: parsed.file_size,
        })
    }

    /// Fetch the bytes of a previously generated document.
    pub async fn download_document(&self, document_url: &str) -> Result<Vec<u8>, VendorError> {
        let Some(api_key) = self.config.api_key.as_ref() else {
            tracing::debug!(url = %document_url, "Mock document fetched");
            return Ok(MOCK_PDF.to_vec());
        };

        let response = self
            .client
            .get(document_url)
            .bearer_auth(api_key.expose_secret())
            .timeout(DOCGEN_TIMEOUT)
            .send()
            .await
            .map_err(vendor_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(VendorError::Rejected {
                vendor: "foxit".to_string(),
                status: status.as_u16(),
                message: format!("document fetch failed for {document_url}"),
            });
        }
        let bytes = response.bytes().await.map_err(vendor_err)?;
        Ok(bytes.to_vec())
    }

    /// Execute a chained PDF processing workflow.
    pub async fn process_pdf_workflow(
        &self,
        document_urls: &[String],
        config: &WorkflowConfig,
    ) -> Result<WorkflowResult, VendorError> {
        let stages = build_stages(document_urls, config);

        let Some(api_key) = self.config.api_key.as_ref() else {
            let id = Uuid::new_v4().to_string();
            tracing::debug!(steps = stages.len(), "Mock workflow executed");
            let final_name = stages
                .last()
                .map(|s| s.output_file.clone())
                .unwrap_or_else(|| "output.pdf".to_string());
            return Ok(WorkflowResult {
                final_document_url: format!("https://docs.onboardiq.local/mock/{id}/{final_name}"),
                workflow_id: format!("mock_workflow_{id}"),
                processing_time: Some(0.0),
                file_size: Some(102_400),
            });
        };

        let payload = json!({
            "documents": document_urls,
            "workflow": stages,
        });

        tracing::info!(steps = stages.len(), "Executing PDF workflow");
        let response = self
            .client
            .post(self.workflow_endpoint())
            .bearer_auth(api_key.expose_secret())
            .header("X-API-Version", "v1")
            .timeout(WORKFLOW_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(vendor_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VendorError::Rejected {
                vendor: "foxit".to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct WorkflowResponse {
            final_document_url: Option<String>,
            workflow_id: Option<String>,
            processing_time: Option<f64>,
            file_size: Option<u64>,
        }

        let parsed: WorkflowResponse =
            response.json().await.map_err(|e| VendorError::InvalidResponse {
                vendor: "foxit".to_string(),
                reason: e.to_string(),
            })?;

        let final_document_url =
            parsed
                .final_document_url
                .ok_or_else(|| VendorError::InvalidResponse {
                    vendor: "foxit".to_string(),
                    reason: "missing finalDocumentUrl".to_string(),
                })?;

        Ok(WorkflowResult {
            final_document_url,
            workflow_id: parsed
                .workflow_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            processing_time: parsed.processing_time,
            file_size: parsed.file_size,
        })
    }

    /// Generate welcome letter + contract, then run the packet workflow:
    /// compress, watermark with the customer name, 128-bit security.
    pub async fn create_welcome_packet(
        &self,
        user_data: &PacketUserData,
    ) -> Result<WelcomePacket, VendorError> {
        let name = user_data.name.as_deref().unwrap_or("Valued Customer");
        let doc_data = json!({
            "customer_name": name,
            "company_name": user_data.company.as_deref().unwrap_or("Your Company"),
            "plan_name": user_data.plan.as_deref().unwrap_or("Standard Plan"),
            "email": user_data.email.as_deref().unwrap_or(""),
            "phone": user_data.phone.as_deref().unwrap_or(""),
            "account_id": user_data.account_id.as_deref().unwrap_or(""),
            "welcome_message": format!("Welcome to OnboardIQ, {name}!"),
            "signup_date": Utc::now().format("%Y-%m-%d").to_string(),
            "generated_at": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });

        let welcome = self
            .generate_document(&self.config.templates.welcome_packet, &doc_data, "pdf")
            .await?;
        let contract = self
            .generate_document(&self.config.templates.contract, &doc_data, "pdf")
            .await?;

        let workflow_config = WorkflowConfig {
            compress: true,
            compression_level: Some("high".to_string()),
            image_quality: None,
            watermark: Some(workflow::WatermarkConfig {
                kind: Some("text".to_string()),
                text: Some(format!("Prepared for {name}")),
                opacity: Some(0.3),
                rotation: Some(45.0),
                position: Some("center".to_string()),
                font_size: Some(20),
                color: Some("#666666".to_string()),
            }),
            add_security: Some(workflow::SecurityConfig {
                password: None,
                permissions: Some(vec!["print".to_string(), "copy".to_string()]),
                encryption_level: Some("128".to_string()),
            }),
        };

        let urls = vec![welcome.document_url.clone(), contract.document_url.clone()];
        let result = self.process_pdf_workflow(&urls, &workflow_config).await?;

        tracing::info!(customer = name, "Welcome packet created");
        Ok(WelcomePacket {
            final_document_url: result.final_document_url,
            welcome_document_url: welcome.document_url,
            contract_document_url: contract.document_url,
            workflow_id: result.workflow_id,
        })
    }

    /// Generate a personalized onboarding guide.
    pub async fn create_onboarding_guide(
        &self,
        user_data: &PacketUserData,
        features: &[String],
    ) -> Result<GeneratedDocument, VendorError> {
        let doc_data = json!({
            "customer_name": user_data.name.as_deref().unwrap_or("Valued Customer"),
            "company_name": user_data.company.as_deref().unwrap_or("Your Company"),
            "plan_name": user_data.plan.as_deref().unwrap_or("Standard Plan"),
            "step_by_step_guide": true,
            "custom_features": features,
            "support_contact": "support@onboardiq.com",
            "generated_at": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        self.generate_document(&self.config.templates.user_guide, &doc_data, "pdf")
            .await
    }

    /// Generate an invoice document.
    pub async fn create_invoice(&self, billing_data: &Value) -> Result<GeneratedDocument, VendorError> {
        let doc_data = json!({
            "invoice_number": billing_data.get("invoice_number").cloned().unwrap_or(json!("INV-001")),
            "customer_name": billing_data.get("customer_name").cloned().unwrap_or(json!("Customer")),
            "company_name": billing_data.get("company_name").cloned().unwrap_or(json!("Company")),
            "plan_name": billing_data.get("plan_name").cloned().unwrap_or(json!("Plan")),
            "amount": billing_data.get("amount").cloned().unwrap_or(json!(0)),
            "currency": billing_data.get("currency").cloned().unwrap_or(json!("USD")),
            "due_date": billing_data.get("due_date").cloned().unwrap_or(json!("")),
            "items": billing_data.get("items").cloned().unwrap_or(json!([])),
            "generated_at": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        self.generate_document(&self.config.templates.invoice, &doc_data, "pdf")
            .await
    }

    /// Template ids and endpoints as exposed by `GET /api/foxit/templates`.
    pub fn template_info(&self) -> Value {
        json!({
            "templates": {
                "welcome_packet": self.config.templates.welcome_packet,
                "contract": self.config.templates.contract,
                "onboarding_guide": self.config.templates.user_guide,
                "invoice": self.config.templates.invoice,
            },
            "api_base_url": self.config.base_url,
            "endpoints": {
                "document_generation": self.docgen_endpoint(),
                "pdf_services": self.workflow_endpoint(),
            },
            "status": if self.is_mock() { "not_configured" } else { "configured" },
        })
    }

    /// Check vendor connectivity. Mock mode reports healthy without a call.
    pub async fn health_check(&self) -> Value {
        if self.is_mock() {
            return json!({
                "status": "healthy",
                "mode": "mock",
                "api_key_configured": false,
            });
        }

        let health_url = format!("{}/health", self.config.base_url);
        let started = std::time::Instant::now();
        match self
            .client
            .get(&health_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => json!({
                "status": if response.status().is_success() { "healthy" } else { "unhealthy" },
                "response_time": started.elapsed().as_secs_f64(),
                "api_key_configured": true,
            }),
            Err(e) => json!({
                "status": "error",
                "error": e.to_string(),
                "api_key_configured": true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FoxitTemplates;

    fn mock_client() -> FoxitClient {
        FoxitClient::new(FoxitConfig {
            base_url: "https://api.foxit.com".into(),
            api_key: None,
            templates: FoxitTemplates {
                welcome_packet: "template-welcome-123".into(),
                contract: "template-contract-456".into(),
                user_guide: "template-guide-789".into(),
                invoice: "template-invoice-101".into(),
            },
        })
    }

    #[tokio::test]
    async fn test_mock_generate_document() {
        let client = mock_client();
        assert!(client.is_mock());

        let doc = client
            .generate_document("template-welcome-123", &json!({"customer_name": "Ada"}), "pdf")
            .await
            .unwrap();
        assert!(doc.document_url.ends_with(".pdf"));
        assert!(!doc.document_id.is_empty());
    }

    #[tokio::test]
    async fn test_mock_download_returns_pdf_bytes() {
        let client = mock_client();
        let bytes = client
            .download_document("https://docs.onboardiq.local/mock/abc.pdf")
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_mock_welcome_packet() {
        let client = mock_client();
        let packet = client
            .create_welcome_packet(&PacketUserData {
                name: Some("Ada".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(packet.workflow_id.starts_with("mock_workflow_"));
        assert_ne!(packet.welcome_document_url, packet.contract_document_url);
        // The packet chain ends on the secured output.
        assert!(packet.final_document_url.ends_with("secured.pdf"));
    }

    #[tokio::test]
    async fn test_health_check_in_mock_mode() {
        let health = mock_client().health_check().await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["api_key_configured"], false);
    }
}
