//! Generated document records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The document templates we can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    WelcomePacket,
    Contract,
    UserGuide,
    Invoice,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WelcomePacket => "welcome_packet",
            Self::Contract => "contract",
            Self::UserGuide => "user_guide",
            Self::Invoice => "invoice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "welcome_packet" => Some(Self::WelcomePacket),
            "contract" => Some(Self::Contract),
            "user_guide" => Some(Self::UserGuide),
            "invoice" => Some(Self::Invoice),
            _ => None,
        }
    }

    /// Human title used when the request does not supply one.
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::WelcomePacket => "Welcome Packet",
            Self::Contract => "Service Agreement",
            Self::UserGuide => "Onboarding Guide",
            Self::Invoice => "Invoice",
        }
    }
}

/// Lifecycle status of a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Generated,
    Processed,
    Delivered,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generated => "generated",
            Self::Processed => "processed",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "generated" => Self::Generated,
            "processed" => Self::Processed,
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A document generated for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub template_type: TemplateType,
    pub title: String,
    pub status: DocumentStatus,
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
    pub download_url: Option<String>,
    pub operations_applied: Vec<String>,
    pub email_sent: bool,
    pub email_recipient: Option<String>,
    pub delivery_attempts: u32,
    pub ai_generated_content: serde_json::Value,
    pub personalization_applied: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(user_id: &str, template_type: TemplateType, title: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            template_type,
            title: title.to_string(),
            status: DocumentStatus::Pending,
            file_path: None,
            file_size: None,
            download_url: None,
            operations_applied: Vec::new(),
            email_sent: false,
            email_recipient: None,
            delivery_attempts: 0,
            ai_generated_content: json!({}),
            personalization_applied: false,
            created_at: Utc::now(),
            processed_at: None,
            delivered_at: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "document_id": self.id,
            "user_id": self.user_id,
            "template_type": self.template_type,
            "title": self.title,
            "status": self.status,
            "file_path": self.file_path,
            "file_size": self.file_size,
            "download_url": self.download_url,
            "operations_applied": self.operations_applied,
            "email_sent": self.email_sent,
            "email_recipient": self.email_recipient,
            "delivery_attempts": self.delivery_attempts,
            "ai_generated_content": self.ai_generated_content,
            "personalization_applied": self.personalization_applied,
            "created_at": self.created_at,
            "processed_at": self.processed_at,
            "delivered_at": self.delivered_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_type_round_trip() {
        for t in [
            TemplateType::WelcomePacket,
            TemplateType::Contract,
            TemplateType::UserGuide,
            TemplateType::Invoice,
        ] {
            assert_eq!(TemplateType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TemplateType::parse("unknown"), None);
    }

    #[test]
    fn test_new_document_defaults() {
        let doc = Document::new("user-1", TemplateType::Contract, "Service Agreement");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(!doc.email_sent);
        assert_eq!(doc.delivery_attempts, 0);
        assert!(doc.operations_applied.is_empty());
    }
}
