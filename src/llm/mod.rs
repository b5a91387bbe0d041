//! LLM integration for OnboardIQ.
//!
//! Supports:
//! - **OpenAI**: chat completions API
//! - **Anthropic**: messages API
//!
//! Both providers speak plain HTTP via reqwest and implement the
//! `LlmProvider` trait. The AI services never require a provider; every
//! feature has a deterministic fallback when no provider is configured.

mod anthropic;
mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::LlmSettings;
use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    Anthropic,
}

/// Create an LLM provider from configuration.
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match settings.backend {
        LlmBackend::OpenAi => {
            tracing::info!("Using OpenAI (model: {})", settings.model);
            Ok(Arc::new(OpenAiProvider::new(
                settings.api_key.clone(),
                &settings.model,
            )))
        }
        LlmBackend::Anthropic => {
            tracing::info!("Using Anthropic (model: {})", settings.model);
            Ok(Arc::new(AnthropicProvider::new(
                settings.api_key.clone(),
                &settings.model,
            )))
        }
    }
}
