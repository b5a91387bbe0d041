//! Shared application state handed to every route handler.

use std::sync::Arc;

use crate::ai::{ChatbotService, PersonalizationService};
use crate::audit::AuditLog;
use crate::auth::token::TokenService;
use crate::comms::EmailSender;
use crate::config::AppConfig;
use crate::error::Result;
use crate::foxit::FoxitClient;
use crate::llm::{LlmProvider, create_provider};
use crate::store::{Database, LibSqlBackend};
use crate::vonage::VonageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<dyn Database>,
    pub tokens: Arc<TokenService>,
    pub vonage: Arc<VonageClient>,
    pub foxit: Arc<FoxitClient>,
    pub personalization: Arc<PersonalizationService>,
    pub chatbot: Arc<ChatbotService>,
    pub email: Arc<EmailSender>,
    pub audit: AuditLog,
}

impl AppState {
    /// Wire up all services over an already-opened database.
    pub fn build(config: AppConfig, db: Arc<dyn Database>) -> Self {
        let provider: Option<Arc<dyn LlmProvider>> = match &config.llm {
            Some(settings) => match create_provider(settings) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!(error = %e, "LLM provider unavailable; AI features fall back");
                    None
                }
            },
            None => {
                tracing::warn!("No LLM credentials set; AI features fall back");
                None
            }
        };

        let tokens = Arc::new(TokenService::new(&config.jwt));
        let vonage = Arc::new(VonageClient::new(config.vonage.clone()));
        let foxit = Arc::new(FoxitClient::new(config.foxit.clone()));
        let personalization = Arc::new(PersonalizationService::new(db.clone(), provider.clone()));
        let chatbot = Arc::new(ChatbotService::new(db.clone(), provider));
        let email = Arc::new(EmailSender::new(config.smtp.clone()));
        let audit = AuditLog::new(db.clone());

        Self {
            config: Arc::new(config),
            db,
            tokens,
            vonage,
            foxit,
            personalization,
            chatbot,
            email,
            audit,
        }
    }

    /// Open the configured local database and build the state.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let backend = LibSqlBackend::new_local(std::path::Path::new(&config.db_path)).await?;
        Ok(Self::build(config, Arc::new(backend)))
    }

    /// In-memory state for tests: no vendors configured, no LLM.
    pub async fn for_tests() -> Result<Self> {
        let backend = LibSqlBackend::new_memory().await?;
        Ok(Self::build(AppConfig::for_tests(), Arc::new(backend)))
    }
}
