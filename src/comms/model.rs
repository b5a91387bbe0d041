//! Outbound communication records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The kind of message sent to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationKind {
    Sms,
    Email,
    Video,
}

impl CommunicationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "email" => Self::Email,
            "video" => Self::Video,
            _ => Self::Sms,
        }
    }
}

/// Delivery status of a communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl CommunicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A message sent (or attempted) to a user over any channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Communication {
    pub id: String,
    pub user_id: String,
    pub kind: CommunicationKind,
    /// Concrete transport, e.g. `vonage_sms` or `smtp`.
    pub channel: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: CommunicationStatus,
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub ai_optimized: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Communication {
    pub fn new(
        user_id: &str,
        kind: CommunicationKind,
        channel: &str,
        recipient: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            channel: channel.to_string(),
            recipient: recipient.to_string(),
            subject: None,
            message: None,
            status: CommunicationStatus::Pending,
            external_id: None,
            error_message: None,
            retry_count: 0,
            ai_optimized: false,
            created_at: Utc::now(),
            sent_at: None,
            delivered_at: None,
        }
    }

    pub fn mark_sent(&mut self, external_id: Option<String>) {
        self.status = CommunicationStatus::Sent;
        self.external_id = external_id;
        self.sent_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: &str) {
        self.status = CommunicationStatus::Failed;
        self.error_message = Some(error.to_string());
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "communication_id": self.id,
            "user_id": self.user_id,
            "type": self.kind,
            "channel": self.channel,
            "recipient": self.recipient,
            "subject": self.subject,
            "message": self.message,
            "status": self.status,
            "external_id": self.external_id,
            "error_message": self.error_message,
            "retry_count": self.retry_count,
            "ai_optimized": self.ai_optimized,
            "created_at": self.created_at,
            "sent_at": self.sent_at,
            "delivered_at": self.delivered_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_sent_and_failed() {
        let mut comm =
            Communication::new("user-1", CommunicationKind::Sms, "vonage_sms", "+15551234567");
        assert_eq!(comm.status, CommunicationStatus::Pending);

        comm.mark_sent(Some("msg-123".into()));
        assert_eq!(comm.status, CommunicationStatus::Sent);
        assert!(comm.sent_at.is_some());

        comm.mark_failed("network unreachable");
        assert_eq!(comm.status, CommunicationStatus::Failed);
        assert_eq!(comm.error_message.as_deref(), Some("network unreachable"));
    }
}
