//! Onboarding support chatbot with in-memory conversation history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::ai::model::{AiInteraction, InteractionKind};
use crate::auth::user::User;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::store::Database;

/// Number of turns kept per conversation.
const HISTORY_LIMIT: usize = 20;

/// A chatbot reply and the conversation it belongs to.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
    pub success: bool,
    pub interaction_id: Option<String>,
    pub processing_time_ms: u64,
}

pub struct ChatbotService {
    db: Arc<dyn Database>,
    provider: Option<Arc<dyn LlmProvider>>,
    conversations: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl ChatbotService {
    pub fn new(db: Arc<dyn Database>, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            db,
            provider,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Answer a user message, continuing `conversation_id` when given.
    pub async fn chat(
        &self,
        user: &User,
        message: &str,
        conversation_id: Option<String>,
        context: &Value,
    ) -> ChatReply {
        let started = Instant::now();
        let conversation_id =
            conversation_id.unwrap_or_else(|| new_conversation_id(Some(&user.id)));

        let system = system_context(user, context);
        let history = {
            let conversations = self.conversations.read().await;
            conversations
                .get(&conversation_id)
                .cloned()
                .unwrap_or_default()
        };

        let (response, success, model) = match self.complete(&system, &history, message).await {
            Some((text, model)) => (text, true, model),
            None => (fallback_response(message), false, "fallback".to_string()),
        };

        {
            let mut conversations = self.conversations.write().await;
            let entry = conversations.entry(conversation_id.clone()).or_default();
            entry.push(ChatMessage::user(message));
            entry.push(ChatMessage::assistant(&response));
            if entry.len() > HISTORY_LIMIT {
                let excess = entry.len() - HISTORY_LIMIT;
                entry.drain(..excess);
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let mut interaction = AiInteraction::new(
            &user.id,
            InteractionKind::Chatbot,
            json!({"message": message}),
            json!({"response": response}),
            &model,
        )
        .with_processing_time(elapsed_ms);
        interaction.context = json!({"conversation_id": conversation_id});

        let interaction_id = match self.db.insert_interaction(&interaction).await {
            Ok(()) => Some(interaction.id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist chatbot interaction");
                None
            }
        };

        ChatReply {
            response,
            conversation_id,
            success,
            interaction_id,
            processing_time_ms: elapsed_ms,
        }
    }

    /// Drop a conversation's history.
    pub async fn end_conversation(&self, conversation_id: &str) -> bool {
        self.conversations
            .write()
            .await
            .remove(conversation_id)
            .is_some()
    }

    async fn complete(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Option<(String, String)> {
        let provider = self.provider.as_ref()?;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(message));

        let request = CompletionRequest::new(messages)
            .with_temperature(0.7)
            .with_max_tokens(500);

        match provider.complete(request).await {
            Ok(response) => {
                let text = response.content.trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some((text, provider.model_name().to_string()))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Chatbot LLM call failed; using fallback");
                None
            }
        }
    }
}

/// Conversation ids carry the user id when known so support staff can trace
/// them in logs.
pub fn new_conversation_id(user_id: Option<&str>) -> String {
    let suffix: u32 = rand::random();
    match user_id {
        Some(user_id) => format!("conv_{user_id}_{suffix:08x}"),
        None => format!("fallback_{suffix:08x}"),
    }
}

fn system_context(user: &User, context: &Value) -> String {
    let plan = context
        .get("plan_type")
        .and_then(Value::as_str)
        .unwrap_or("basic");
    let step = context
        .get("current_step")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    format!(
        "You are the OnboardIQ onboarding assistant. You help customers finish \
         setting up their account.\n\
         Customer name: {name}\n\
         Plan: {plan}\n\
         Current onboarding step: {step}\n\
         Phone verified: {verified}\n\n\
         Be concise and friendly. Help with verification codes, document \
         downloads, video calls, and general onboarding questions. If you \
         cannot help, suggest contacting support.",
        name = user.display_name(),
        verified = user.is_verified,
    )
}

/// Keyword-routed canned replies used when the provider is unavailable.
pub fn fallback_response(message: &str) -> String {
    let lower = message.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(&["hello", "hi", "hey", "start"]) {
        "Hello! Welcome to OnboardIQ. I'm here to help you get set up. \
         What can I help you with today?"
    } else if contains_any(&["verify", "verification", "code", "sms"]) {
        "To verify your phone number, enter the 6-digit code we sent you by SMS. \
         If you didn't receive it, you can request a new code from the \
         verification screen."
    } else if contains_any(&["document", "pdf", "download"]) {
        "Your onboarding documents are available in the Documents section. \
         You can generate a welcome packet, contract, or user guide and \
         download them as PDFs."
    } else if contains_any(&["video", "call", "meeting"]) {
        "Premium plans include a welcome video call. You can start one from \
         your onboarding dashboard and we'll connect you with a specialist."
    } else if contains_any(&["help", "support", "problem", "issue"]) {
        "I'm sorry you're running into trouble. Could you describe the problem \
         in a bit more detail? For urgent issues, our support team is available \
         at support@onboardiq.com."
    } else if contains_any(&["thank", "thanks", "bye", "goodbye"]) {
        "You're welcome! Good luck with the rest of your onboarding. \
         Come back any time you have questions."
    } else {
        "I can help with phone verification, documents, video calls, and other \
         onboarding questions. What would you like to know?"
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, LlmProvider, TokenUsage};
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(CompletionResponse {
                content: format!("echo: {last}"),
                usage: TokenUsage {
                    prompt_tokens: 5,
                    completion_tokens: 5,
                },
            })
        }

        fn model_name(&self) -> &str {
            "echo-model"
        }
    }

    async fn service(provider: Option<Arc<dyn LlmProvider>>) -> (ChatbotService, User) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let user = User::new("+15551234567");
        db.insert_user(&user).await.unwrap();
        (ChatbotService::new(db, provider), user)
    }

    #[tokio::test]
    async fn test_fallback_reply_without_provider() {
        let (svc, user) = service(None).await;
        let reply = svc.chat(&user, "how do I verify my code?", None, &json!({})).await;
        assert!(!reply.success);
        assert!(reply.response.contains("6-digit code"));
        assert!(reply.conversation_id.starts_with(&format!("conv_{}_", user.id)));
    }

    #[tokio::test]
    async fn test_conversation_continues_and_is_capped() {
        let (svc, user) = service(Some(Arc::new(EchoProvider))).await;
        let first = svc.chat(&user, "hello", None, &json!({})).await;
        assert!(first.success);

        for i in 0..15 {
            svc.chat(&user, &format!("msg {i}"), Some(first.conversation_id.clone()), &json!({}))
                .await;
        }

        let conversations = svc.conversations.read().await;
        let history = conversations.get(&first.conversation_id).unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_end_conversation_clears_history() {
        let (svc, user) = service(None).await;
        let reply = svc.chat(&user, "hi", None, &json!({})).await;
        assert!(svc.end_conversation(&reply.conversation_id).await);
        assert!(!svc.end_conversation(&reply.conversation_id).await);
    }

    #[test]
    fn test_fallback_keyword_routing() {
        assert!(fallback_response("Hello there").contains("Welcome to OnboardIQ"));
        assert!(fallback_response("where is my PDF").contains("Documents"));
        assert!(fallback_response("schedule a video call").contains("video call"));
        assert!(fallback_response("thanks!").contains("You're welcome"));
        assert!(fallback_response("quantum physics").contains("What would you like to know"));
    }

    #[test]
    fn test_conversation_id_shapes() {
        assert!(new_conversation_id(Some("u1")).starts_with("conv_u1_"));
        assert!(new_conversation_id(None).starts_with("fallback_"));
    }
}
