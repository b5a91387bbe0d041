//! Persisted AI interaction records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::llm::TokenUsage;

/// The AI feature an interaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Personalization,
    CommunicationOptimization,
    BehaviorAnalysis,
    FraudDetection,
    Chatbot,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personalization => "personalization",
            Self::CommunicationOptimization => "communication_optimization",
            Self::BehaviorAnalysis => "behavior_analysis",
            Self::FraudDetection => "fraud_detection",
            Self::Chatbot => "chatbot",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "communication_optimization" => Self::CommunicationOptimization,
            "behavior_analysis" => Self::BehaviorAnalysis,
            "fraud_detection" => Self::FraudDetection,
            "chatbot" => Self::Chatbot,
            _ => Self::Personalization,
        }
    }
}

/// User feedback on an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
    Neutral,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// USD cost of a completion: prompt and completion tokens billed at
/// different per-token rates, rounded to 6 decimal places.
pub fn completion_cost_usd(usage: &TokenUsage) -> Decimal {
    let prompt_rate = Decimal::new(3, 5); // 0.00003
    let completion_rate = Decimal::new(6, 5); // 0.00006
    let cost = Decimal::from(usage.prompt_tokens) * prompt_rate
        + Decimal::from(usage.completion_tokens) * completion_rate;
    cost.round_dp(6)
}

/// One call into an AI feature, with its inputs, outputs, and accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInteraction {
    pub id: String,
    pub user_id: String,
    pub kind: InteractionKind,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub model: String,
    pub confidence: Option<f64>,
    pub processing_time_ms: Option<u64>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: Option<Decimal>,
    pub context: serde_json::Value,
    pub feedback: Option<Feedback>,
    pub feedback_details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AiInteraction {
    pub fn new(
        user_id: &str,
        kind: InteractionKind,
        input: serde_json::Value,
        output: serde_json::Value,
        model: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            input,
            output,
            model: model.to_string(),
            confidence: None,
            processing_time_ms: None,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_usd: None,
            context: json!({}),
            feedback: None,
            feedback_details: None,
            created_at: Utc::now(),
        }
    }

    /// Attach token usage and the derived cost.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.prompt_tokens = usage.prompt_tokens;
        self.completion_tokens = usage.completion_tokens;
        self.cost_usd = Some(completion_cost_usd(&usage));
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "interaction_id": self.id,
            "user_id": self.user_id,
            "interaction_type": self.kind,
            "input_data": self.input,
            "output_data": self.output,
            "model_used": self.model,
            "confidence_score": self.confidence,
            "processing_time_ms": self.processing_time_ms,
            "token_usage": {
                "prompt_tokens": self.prompt_tokens,
                "completion_tokens": self.completion_tokens,
            },
            "cost_usd": self.cost_usd,
            "context": self.context,
            "user_feedback": self.feedback,
            "feedback_details": self.feedback_details,
            "created_at": self.created_at,
        })
    }
}
