//! Configuration types, built from environment variables.

use secrecy::SecretString;

use crate::llm::LlmBackend;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path to the libSQL database file.
    pub db_path: String,
    /// Directory where generated document files are stored.
    pub documents_dir: String,
    /// JWT signing configuration.
    pub jwt: JwtConfig,
    /// Vonage credentials (mock mode when `None`).
    pub vonage: VonageConfig,
    /// Foxit credentials and template ids.
    pub foxit: FoxitConfig,
    /// LLM provider configuration (`None` disables AI, fallbacks apply).
    pub llm: Option<LlmSettings>,
    /// SMTP settings for document delivery (`None` disables email).
    pub smtp: Option<SmtpConfig>,
    /// Optional directory for rolling log files.
    pub log_dir: Option<String>,
}

impl AppConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("ONBOARDIQ_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let db_path = std::env::var("ONBOARDIQ_DB_PATH")
            .unwrap_or_else(|_| "./data/onboardiq.db".to_string());
        let documents_dir = std::env::var("ONBOARDIQ_DOCUMENTS_DIR")
            .unwrap_or_else(|_| "./data/documents".to_string());

        Self {
            bind_addr,
            db_path,
            documents_dir,
            jwt: JwtConfig::from_env(),
            vonage: VonageConfig::from_env(),
            foxit: FoxitConfig::from_env(),
            llm: LlmSettings::from_env(),
            smtp: SmtpConfig::from_env(),
            log_dir: std::env::var("ONBOARDIQ_LOG_DIR").ok(),
        }
    }

    /// Configuration with no vendors, no LLM, and a fixed JWT secret. Used by
    /// tests that run everything against mock clients and fallbacks.
    pub fn for_tests() -> Self {
        let documents_dir = std::env::temp_dir()
            .join(format!("onboardiq-docs-{}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: ":memory:".to_string(),
            documents_dir,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                access_expiry_secs: 3600,
                refresh_expiry_secs: 7 * 24 * 3600,
            },
            vonage: VonageConfig {
                api_key: String::new(),
                api_secret: None,
                brand_name: "OnboardIQ".to_string(),
                sender_id: "OnboardIQ".to_string(),
                video_api_key: None,
                video_api_secret: None,
            },
            foxit: FoxitConfig {
                base_url: "https://api.foxit.com".to_string(),
                api_key: None,
                templates: FoxitTemplates {
                    welcome_packet: "template-welcome-123".to_string(),
                    contract: "template-contract-456".to_string(),
                    user_guide: "template-guide-789".to_string(),
                    invoice: "template-invoice-101".to_string(),
                },
            },
            llm: None,
            smtp: None,
            log_dir: None,
        }
    }
}

/// JWT token configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in seconds.
    pub access_expiry_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expiry_secs: i64,
}

impl JwtConfig {
    /// Load from `JWT_SECRET`, `JWT_ACCESS_EXPIRY_SECS`, `JWT_REFRESH_EXPIRY_SECS`.
    ///
    /// A missing secret gets a random one — tokens then don't survive a
    /// restart, which is fine for development but logged loudly.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using an ephemeral random secret");
            uuid::Uuid::new_v4().to_string()
        });

        let access_expiry_secs: i64 = std::env::var("JWT_ACCESS_EXPIRY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let refresh_expiry_secs: i64 = std::env::var("JWT_REFRESH_EXPIRY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7 * 24 * 3600);

        Self {
            secret,
            access_expiry_secs,
            refresh_expiry_secs,
        }
    }
}

/// Vonage Verify/SMS/Video configuration.
///
/// Without `VONAGE_API_SECRET` the client runs in mock mode: deterministic
/// fake ids, and the Verify check accepts code `123456`.
#[derive(Debug, Clone)]
pub struct VonageConfig {
    pub api_key: String,
    pub api_secret: Option<SecretString>,
    pub brand_name: String,
    pub sender_id: String,
    pub video_api_key: Option<String>,
    pub video_api_secret: Option<SecretString>,
}

impl VonageConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("VONAGE_API_KEY").unwrap_or_default(),
            api_secret: std::env::var("VONAGE_API_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            brand_name: std::env::var("VONAGE_BRAND_NAME")
                .unwrap_or_else(|_| "OnboardIQ".to_string()),
            sender_id: std::env::var("VONAGE_SENDER_ID")
                .unwrap_or_else(|_| "OnboardIQ".to_string()),
            video_api_key: std::env::var("VONAGE_VIDEO_API_KEY").ok(),
            video_api_secret: std::env::var("VONAGE_VIDEO_API_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
        }
    }

    /// Whether real API calls can be made.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && self.api_secret.is_some()
    }
}

/// Foxit document generation / PDF services configuration.
#[derive(Debug, Clone)]
pub struct FoxitConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    /// Template ids, configured per template type in the Foxit dashboard.
    pub templates: FoxitTemplates,
}

/// Template ids for the document types we generate.
#[derive(Debug, Clone)]
pub struct FoxitTemplates {
    pub welcome_packet: String,
    pub contract: String,
    pub user_guide: String,
    pub invoice: String,
}

impl FoxitConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("FOXIT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.foxit.com".to_string()),
            api_key: std::env::var("FOXIT_API_KEY")
                .ok()
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            templates: FoxitTemplates {
                welcome_packet: std::env::var("FOXIT_WELCOME_TEMPLATE_ID")
                    .unwrap_or_else(|_| "template-welcome-123".to_string()),
                contract: std::env::var("FOXIT_CONTRACT_TEMPLATE_ID")
                    .unwrap_or_else(|_| "template-contract-456".to_string()),
                user_guide: std::env::var("FOXIT_GUIDE_TEMPLATE_ID")
                    .unwrap_or_else(|_| "template-guide-789".to_string()),
                invoice: std::env::var("FOXIT_INVOICE_TEMPLATE_ID")
                    .unwrap_or_else(|_| "template-invoice-101".to_string()),
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// LLM provider settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
}

impl LlmSettings {
    /// Returns `None` when no provider API key is set (AI features then use
    /// their deterministic fallbacks).
    pub fn from_env() -> Option<Self> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            return Some(Self {
                backend: LlmBackend::OpenAi,
                api_key: SecretString::from(key),
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
            });
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            return Some(Self {
                backend: LlmBackend::Anthropic,
                api_key: SecretString::from(key),
                model: std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            });
        }
        None
    }
}

/// SMTP configuration for outbound email.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl SmtpConfig {
    /// Returns `None` if `SMTP_HOST` is not set (email disabled).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("SMTP_FROM_ADDRESS")
            .unwrap_or_else(|_| "noreply@onboardiq.com".to_string());

        Some(Self {
            host,
            port,
            username,
            password,
            from_address,
        })
    }
}
