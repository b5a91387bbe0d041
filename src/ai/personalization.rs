//! LLM-driven onboarding personalization, with deterministic fallbacks.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{Value, json};

use crate::ai::extract_json;
use crate::ai::model::{AiInteraction, InteractionKind};
use crate::auth::user::User;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, TokenUsage};
use crate::onboarding::session::{OnboardingSession, PlanType};
use crate::store::Database;

/// Result of an AI feature call. `success` is false when the fallback was
/// used; either way `data` carries a complete payload.
#[derive(Debug, Clone)]
pub struct AiOutcome {
    pub success: bool,
    pub data: Value,
    pub interaction_id: Option<String>,
    pub processing_time_ms: u64,
}

pub struct PersonalizationService {
    db: Arc<dyn Database>,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl PersonalizationService {
    pub fn new(db: Arc<dyn Database>, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { db, provider }
    }

    async fn complete_json(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Option<(Value, TokenUsage, String)> {
        let provider = self.provider.as_ref()?;
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(prompt),
        ])
        .with_temperature(temperature)
        .with_max_tokens(max_tokens);

        match provider.complete(request).await {
            Ok(response) => {
                let parsed = extract_json(&response.content)?;
                Some((parsed, response.usage, provider.model_name().to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM call failed; using fallback");
                None
            }
        }
    }

    /// Persist the interaction row. Failures are logged, never surfaced.
    async fn record(
        &self,
        user_id: &str,
        kind: InteractionKind,
        input: Value,
        output: Value,
        model: &str,
        usage: Option<TokenUsage>,
        confidence: Option<f64>,
        context: Value,
        elapsed_ms: u64,
    ) -> Option<String> {
        let mut interaction = AiInteraction::new(user_id, kind, input, output, model)
            .with_processing_time(elapsed_ms);
        if let Some(usage) = usage {
            interaction = interaction.with_usage(usage);
        }
        if let Some(confidence) = confidence {
            interaction = interaction.with_confidence(confidence);
        }
        interaction.context = context;

        let id = interaction.id.clone();
        match self.db.insert_interaction(&interaction).await {
            Ok(()) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist AI interaction");
                None
            }
        }
    }

    /// Build a personalized onboarding flow for a user.
    pub async fn personalize_onboarding(&self, user: &User, plan_type: PlanType) -> AiOutcome {
        let started = Instant::now();
        let user_context = json!({
            "phone_number": user.phone_number,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "plan_type": plan_type,
            "registration_date": user.created_at,
            "is_verified": user.is_verified,
        });

        let prompt = format!(
            "You are an AI onboarding specialist for OnboardIQ, a multi-channel customer \
             onboarding platform.\n\nUser Profile:\n{user_context:#}\n\n\
             Based on this user profile, create a personalized onboarding experience that \
             includes:\n\
             1. Recommended onboarding steps (prioritized list, key: recommended_steps)\n\
             2. Communication preferences (SMS, email, video call timing)\n\
             3. Document templates that would be most relevant\n\
             4. Personalization score (0-100, key: personalization_score)\n\
             5. Estimated completion time\n\
             6. Success probability prediction\n\n\
             Consider plan type (basic vs premium features), engagement patterns, optimal \
             communication channels, and time-sensitive steps.\n\n\
             Respond with a JSON object containing these recommendations."
        );

        let result = self
            .complete_json(
                "You are an expert AI onboarding specialist. Always respond with valid JSON.",
                &prompt,
                0.7,
                1000,
            )
            .await;

        let (success, data, usage, model) = match result {
            Some((data, usage, model)) => (true, data, Some(usage), model),
            None => (
                false,
                fallback_personalization(plan_type),
                None,
                "fallback".to_string(),
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let confidence = data
            .get("personalization_score")
            .and_then(Value::as_f64)
            .map(|s| s / 100.0);
        let interaction_id = self
            .record(
                &user.id,
                InteractionKind::Personalization,
                user_context,
                data.clone(),
                &model,
                usage,
                confidence,
                json!({"plan_type": plan_type, "feature": "onboarding_flow"}),
                elapsed_ms,
            )
            .await;

        AiOutcome {
            success,
            data,
            interaction_id,
            processing_time_ms: elapsed_ms,
        }
    }

    /// Generate channel-appropriate communication copy.
    pub async fn optimize_communication(
        &self,
        user: &User,
        communication_type: &str,
        context: &Value,
    ) -> AiOutcome {
        let started = Instant::now();
        let user_context = json!({
            "first_name": user.display_name(),
            "plan_type": context.get("plan_type").cloned().unwrap_or(json!("basic")),
            "current_step": context.get("current_step").cloned().unwrap_or(json!(0)),
            "communication_type": communication_type,
        });

        let prompt = format!(
            "Create personalized {communication_type} content for OnboardIQ customer \
             onboarding.\n\nUser Context:\n{user_context:#}\n\n\
             Requirements: professional but friendly tone, appropriate length for \
             {communication_type}, clear next steps, personalize with the user's name, \
             include OnboardIQ branding.\n\
             For SMS: keep under 160 characters.\n\
             For Email: include subject line and body.\n\
             For Push: include title and message.\n\n\
             Respond with JSON containing the optimized content and metadata."
        );

        let result = self
            .complete_json(
                "You are an expert copywriter specializing in customer onboarding communications.",
                &prompt,
                0.8,
                500,
            )
            .await;

        let (success, data, usage, model) = match result {
            Some((data, usage, model)) => (true, data, Some(usage), model),
            None => (
                false,
                fallback_communication(user, communication_type),
                None,
                "fallback".to_string(),
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let interaction_id = self
            .record(
                &user.id,
                InteractionKind::CommunicationOptimization,
                user_context,
                data.clone(),
                &model,
                usage,
                None,
                json!({"communication_type": communication_type}),
                elapsed_ms,
            )
            .await;

        AiOutcome {
            success,
            data,
            interaction_id,
            processing_time_ms: elapsed_ms,
        }
    }

    /// Analyze a user's onboarding behavior and predict success.
    pub async fn analyze_behavior(&self, user: &User, session: &OnboardingSession) -> AiOutcome {
        let started = Instant::now();
        let session_duration_mins = (session
            .completed_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(session.created_at))
        .num_minutes();
        let behavior_data = json!({
            "user_id": user.id,
            "session_duration": session_duration_mins,
            "steps_completed": session.steps_completed.len(),
            "total_steps": session.total_steps,
            "progress_percentage": session.progress_percentage(),
            "plan_type": session.plan_type,
            "verification_attempts": user.verification_attempts,
            "time_since_registration": Utc::now()
                .signed_duration_since(user.created_at)
                .num_hours(),
        });

        let prompt = format!(
            "Analyze user onboarding behavior and provide insights:\n\n\
             Behavior Data:\n{behavior_data:#}\n\n\
             Provide analysis including:\n\
             1. Success probability (0-100, key: success_probability)\n\
             2. Risk factors for abandonment\n\
             3. Recommended interventions\n\
             4. Optimal next communication timing\n\
             5. Engagement score (0-100, key: engagement_score)\n\
             6. Predicted completion time\n\n\
             Respond with JSON containing the analysis and recommendations."
        );

        let result = self
            .complete_json(
                "You are a data analyst specializing in user behavior and onboarding optimization.",
                &prompt,
                0.3,
                800,
            )
            .await;

        let (success, data, usage, model) = match result {
            Some((data, usage, model)) => (true, data, Some(usage), model),
            None => (
                false,
                fallback_behavior_analysis(session.progress_percentage()),
                None,
                "fallback".to_string(),
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let interaction_id = self
            .record(
                &user.id,
                InteractionKind::BehaviorAnalysis,
                behavior_data,
                data.clone(),
                &model,
                usage,
                None,
                json!({"session_id": session.id}),
                elapsed_ms,
            )
            .await;

        AiOutcome {
            success,
            data,
            interaction_id,
            processing_time_ms: elapsed_ms,
        }
    }

    /// Score fraud risk for an onboarding attempt.
    pub async fn detect_fraud(&self, user: &User, context: &Value) -> AiOutcome {
        let started = Instant::now();
        let fraud_context = json!({
            "phone_number": user.phone_number,
            "verification_attempts": user.verification_attempts,
            "registration_time": user.created_at,
            "ip_address": context.get("ip_address").cloned().unwrap_or(Value::Null),
            "user_agent": context.get("user_agent").cloned().unwrap_or(Value::Null),
            "device_fingerprint": context.get("device_fingerprint").cloned().unwrap_or(Value::Null),
            "behavioral_patterns": context.get("behavioral_patterns").cloned().unwrap_or(json!({})),
        });

        let prompt = format!(
            "Analyze potential fraud risk for user onboarding:\n\n\
             Context Data:\n{fraud_context:#}\n\n\
             Evaluate phone number patterns, verification behavior, registration timing, \
             device/location inconsistencies, and behavioral anomalies.\n\n\
             Provide:\n\
             - Risk score (0-100, where 100 is highest risk, key: risk_score)\n\
             - Risk factors identified\n\
             - Confidence level (0-100, key: confidence_level)\n\
             - Recommended actions\n\n\
             Respond with JSON containing the fraud risk assessment."
        );

        let result = self
            .complete_json(
                "You are a fraud detection specialist with expertise in onboarding security.",
                &prompt,
                0.1,
                600,
            )
            .await;

        let (success, data, usage, model) = match result {
            Some((data, usage, model)) => (true, data, Some(usage), model),
            None => (
                false,
                fallback_fraud_analysis(user.verification_attempts),
                None,
                "fallback".to_string(),
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let confidence = data
            .get("confidence_level")
            .and_then(Value::as_f64)
            .map(|c| c / 100.0);
        let interaction_id = self
            .record(
                &user.id,
                InteractionKind::FraudDetection,
                fraud_context,
                data.clone(),
                &model,
                usage,
                confidence,
                json!({"feature": "fraud_detection"}),
                elapsed_ms,
            )
            .await;

        AiOutcome {
            success,
            data,
            interaction_id,
            processing_time_ms: elapsed_ms,
        }
    }
}

/// Canned onboarding flow used when the provider is unavailable.
pub fn fallback_personalization(plan_type: PlanType) -> Value {
    let steps = recommended_fallback_steps(plan_type);
    json!({
        "recommended_steps": steps,
        "communication_preferences": {
            "primary_channel": "sms",
            "optimal_time": "10:00-16:00",
            "frequency": "daily",
        },
        "document_templates": ["welcome_packet", "user_guide"],
        "personalization_score": 60,
        "estimated_completion_time": "15-30 minutes",
        "success_probability": 85,
    })
}

/// Step list per plan when personalization falls back.
pub fn recommended_fallback_steps(plan_type: PlanType) -> Vec<&'static str> {
    match plan_type {
        PlanType::Premium => vec![
            "welcome_video_call",
            "personalized_tour",
            "document_generation",
            "follow_up_sms",
        ],
        PlanType::Basic => vec!["welcome_sms", "basic_tour", "document_generation"],
    }
}

pub fn fallback_communication(user: &User, communication_type: &str) -> Value {
    let name = user.display_name();
    match communication_type {
        "sms" => json!({
            "message": format!(
                "Hi {name}! Welcome to OnboardIQ. Complete your setup to get started. \
                 Reply STOP to opt out."
            ),
            "urgency_level": "medium",
        }),
        "email" => json!({
            "subject": format!("Welcome to OnboardIQ, {name}!"),
            "body": format!(
                "Hi {name},\n\nWelcome to OnboardIQ! We're excited to help you get \
                 started.\n\nBest regards,\nThe OnboardIQ Team"
            ),
            "urgency_level": "low",
        }),
        _ => json!({
            "title": "Welcome to OnboardIQ",
            "message": format!("Hi {name}! Complete your onboarding to get started."),
            "urgency_level": "medium",
        }),
    }
}

pub fn fallback_behavior_analysis(progress: f64) -> Value {
    let (success_probability, engagement_score) = if progress > 75.0 {
        (90, 85)
    } else if progress > 50.0 {
        (70, 65)
    } else {
        (45, 40)
    };
    let slow = progress < 50.0;
    json!({
        "success_probability": success_probability,
        "engagement_score": engagement_score,
        "risk_factors": if slow { json!(["slow_progress"]) } else { json!([]) },
        "recommended_interventions": if slow { json!(["follow_up_sms"]) } else { json!([]) },
        "optimal_next_contact": "2 hours",
        "predicted_completion_time": "1-2 days",
    })
}

pub fn fallback_fraud_analysis(verification_attempts: u32) -> Value {
    let (risk_score, risk_factors) = if verification_attempts > 3 {
        (75, json!(["excessive_verification_attempts"]))
    } else {
        (25, json!([]))
    };
    json!({
        "risk_score": risk_score,
        "risk_factors": risk_factors,
        "confidence_level": 60,
        "recommended_actions": if risk_score > 50 {
            json!(["additional_verification"])
        } else {
            json!(["proceed_normal"])
        },
        "additional_verification_needed": risk_score > 50,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "test".into(),
                reason: "unreachable".into(),
            })
        }

        fn model_name(&self) -> &str {
            "failing-model"
        }
    }

    struct ScriptedProvider(Value);

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 50,
                },
            })
        }

        fn model_name(&self) -> &str {
            "scripted-model"
        }
    }

    async fn service_with(
        provider: Option<Arc<dyn LlmProvider>>,
    ) -> (PersonalizationService, Arc<dyn Database>, User) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let user = User::new("+15551234567");
        db.insert_user(&user).await.unwrap();
        (PersonalizationService::new(db.clone(), provider), db, user)
    }

    #[tokio::test]
    async fn test_provider_failure_returns_fallback() {
        let (svc, _db, user) = service_with(Some(Arc::new(FailingProvider))).await;
        let outcome = svc.personalize_onboarding(&user, PlanType::Basic).await;

        assert!(!outcome.success);
        assert_eq!(outcome.data["personalization_score"], 60);
        assert_eq!(
            outcome.data["recommended_steps"],
            json!(["welcome_sms", "basic_tour", "document_generation"])
        );
    }

    #[tokio::test]
    async fn test_no_provider_returns_fallback_and_records() {
        let (svc, db, user) = service_with(None).await;
        let outcome = svc.personalize_onboarding(&user, PlanType::Premium).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.data["recommended_steps"],
            json!([
                "welcome_video_call",
                "personalized_tour",
                "document_generation",
                "follow_up_sms"
            ])
        );
        // The fallback run is still recorded.
        let id = outcome.interaction_id.unwrap();
        let stored = db.get_interaction(&id).await.unwrap().unwrap();
        assert_eq!(stored.model, "fallback");
    }

    #[tokio::test]
    async fn test_scripted_provider_success_path() {
        let scripted = json!({"personalization_score": 88, "recommended_steps": ["a"]});
        let (svc, db, user) =
            service_with(Some(Arc::new(ScriptedProvider(scripted.clone())))).await;
        let outcome = svc.personalize_onboarding(&user, PlanType::Basic).await;

        assert!(outcome.success);
        assert_eq!(outcome.data, scripted);

        let id = outcome.interaction_id.unwrap();
        let stored = db.get_interaction(&id).await.unwrap().unwrap();
        assert_eq!(stored.model, "scripted-model");
        assert_eq!(stored.prompt_tokens, 100);
        assert!(stored.cost_usd.is_some());
        assert_eq!(stored.confidence, Some(0.88));
    }

    #[tokio::test]
    async fn test_fraud_fallback_scales_with_attempts() {
        let (svc, _db, mut user) = service_with(Some(Arc::new(FailingProvider))).await;
        user.verification_attempts = 5;
        let outcome = svc.detect_fraud(&user, &json!({})).await;

        assert!(!outcome.success);
        assert_eq!(outcome.data["risk_score"], 75);
        assert_eq!(outcome.data["additional_verification_needed"], true);

        user.verification_attempts = 1;
        let outcome = svc.detect_fraud(&user, &json!({})).await;
        assert_eq!(outcome.data["risk_score"], 25);
    }

    #[test]
    fn test_behavior_fallback_tiers() {
        assert_eq!(fallback_behavior_analysis(80.0)["success_probability"], 90);
        assert_eq!(fallback_behavior_analysis(60.0)["success_probability"], 70);
        assert_eq!(fallback_behavior_analysis(20.0)["success_probability"], 45);
        assert_eq!(
            fallback_behavior_analysis(20.0)["recommended_interventions"],
            json!(["follow_up_sms"])
        );
    }

    #[test]
    fn test_sms_fallback_copy_mentions_user() {
        let mut user = User::new("+15551234567");
        user.first_name = Some("Ada".into());
        let content = fallback_communication(&user, "sms");
        let message = content["message"].as_str().unwrap();
        assert!(message.starts_with("Hi Ada!"));
        assert!(message.contains("OnboardIQ"));
    }
}
