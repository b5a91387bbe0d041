//! AI features: personalization, communication copy, behavior and fraud
//! analysis, and the support chatbot.
//!
//! Every operation degrades to a deterministic fallback payload when the LLM
//! provider is missing or fails; vendor errors never reach the client.

pub mod chatbot;
pub mod model;
pub mod personalization;
pub mod routes;

pub use chatbot::ChatbotService;
pub use model::{AiInteraction, Feedback, InteractionKind};
pub use personalization::{AiOutcome, PersonalizationService};

/// Pull a JSON object out of a model reply.
///
/// Tries a direct parse first, then the span between the first `{` and the
/// last `}` (models often wrap JSON in prose or code fences).
pub(crate) fn extract_json(content: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
        if value.is_object() {
            return Some(value);
        }
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_direct() {
        let value = extract_json(r#"{"score": 80}"#).unwrap();
        assert_eq!(value["score"], 80);
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let content = "Here you go:\n```json\n{\"score\": 80}\n```";
        let value = extract_json(content).unwrap();
        assert_eq!(value["score"], 80);
    }

    #[test]
    fn test_extract_json_rejects_prose() {
        assert!(extract_json("no json here").is_none());
    }
}
