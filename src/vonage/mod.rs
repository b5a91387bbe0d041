//! Vonage Verify / SMS / Video client.
//!
//! Without credentials the client runs in mock mode: deterministic fake ids
//! and a Verify check that accepts `123456`. This mirrors a development
//! deployment and keeps the end-to-end tests hermetic.

use rand::Rng;
use secrecy::ExposeSecret;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::VonageConfig;
use crate::error::VendorError;

const VERIFY_URL: &str = "https://api.nexmo.com/verify/json";
const VERIFY_CHECK_URL: &str = "https://api.nexmo.com/verify/check/json";
const VERIFY_CONTROL_URL: &str = "https://api.nexmo.com/verify/control/json";
const SMS_URL: &str = "https://rest.nexmo.com/sms/json";

/// Verify code accepted in mock mode.
pub const MOCK_VERIFY_CODE: &str = "123456";

/// A started phone verification.
#[derive(Debug, Clone)]
pub struct VerifyStart {
    pub request_id: String,
}

/// A sent SMS.
#[derive(Debug, Clone)]
pub struct SmsResult {
    pub message_id: String,
}

/// A created video session.
#[derive(Debug, Clone)]
pub struct VideoSession {
    pub session_id: String,
    pub token: String,
}

pub struct VonageClient {
    config: VonageConfig,
    client: reqwest::Client,
}

fn vendor_err(reason: impl ToString) -> VendorError {
    VendorError::RequestFailed {
        vendor: "vonage".to_string(),
        reason: reason.to_string(),
    }
}

fn mock_id(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{prefix}{suffix:08x}")
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: String,
    request_id: Option<String>,
    error_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmsResponse {
    messages: Vec<SmsMessageStatus>,
}

#[derive(Debug, Deserialize)]
struct SmsMessageStatus {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

impl VonageClient {
    pub fn new(config: VonageConfig) -> Self {
        if !config.is_configured() {
            tracing::warn!("Vonage credentials not set; running in mock mode");
        }
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_mock(&self) -> bool {
        !self.config.is_configured()
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        self.config
            .api_secret
            .as_ref()
            .map(|secret| (self.config.api_key.as_str(), secret.expose_secret()))
    }

    /// Start a Verify flow: sends an SMS one-time code to the number.
    pub async fn start_verification(&self, phone_number: &str) -> Result<VerifyStart, VendorError> {
        let Some((key, secret)) = self.credentials() else {
            tracing::debug!(phone = %phone_number, "Mock verification started");
            return Ok(VerifyStart {
                request_id: mock_id("mock_verify_"),
            });
        };

        let response = self
            .client
            .post(VERIFY_URL)
            .form(&[
                ("api_key", key),
                ("api_secret", secret),
                ("number", phone_number),
                ("brand", &self.config.brand_name),
                ("code_length", "6"),
            ])
            .send()
            .await
            .map_err(vendor_err)?;

        let parsed: VerifyResponse = response
            .json()
            .await
            .map_err(|e| VendorError::InvalidResponse {
                vendor: "vonage".to_string(),
                reason: e.to_string(),
            })?;

        if parsed.status != "0" {
            return Err(VendorError::Rejected {
                vendor: "vonage".to_string(),
                status: 200,
                message: parsed
                    .error_text
                    .unwrap_or_else(|| format!("verify status {}", parsed.status)),
            });
        }
        parsed
            .request_id
            .map(|request_id| VerifyStart { request_id })
            .ok_or_else(|| VendorError::InvalidResponse {
                vendor: "vonage".to_string(),
                reason: "missing request_id".to_string(),
            })
    }

    /// Check a Verify code. `Ok(false)` means the code was wrong or expired;
    /// errors are transport/vendor failures.
    pub async fn check_verification(
        &self,
        request_id: &str,
        code: &str,
    ) -> Result<bool, VendorError> {
        let Some((key, secret)) = self.credentials() else {
            return Ok(code == MOCK_VERIFY_CODE);
        };

        let response = self
            .client
            .post(VERIFY_CHECK_URL)
            .form(&[
                ("api_key", key),
                ("api_secret", secret),
                ("request_id", request_id),
                ("code", code),
            ])
            .send()
            .await
            .map_err(vendor_err)?;

        let parsed: VerifyResponse = response
            .json()
            .await
            .map_err(|e| VendorError::InvalidResponse {
                vendor: "vonage".to_string(),
                reason: e.to_string(),
            })?;

        // Status 16 is "code does not match"; 6 covers expired requests.
        match parsed.status.as_str() {
            "0" => Ok(true),
            "6" | "16" | "17" => Ok(false),
            other => Err(VendorError::Rejected {
                vendor: "vonage".to_string(),
                status: 200,
                message: parsed
                    .error_text
                    .unwrap_or_else(|| format!("verify check status {other}")),
            }),
        }
    }

    /// Cancel an outstanding Verify request.
    pub async fn cancel_verification(&self, request_id: &str) -> Result<(), VendorError> {
        let Some((key, secret)) = self.credentials() else {
            return Ok(());
        };

        self.client
            .post(VERIFY_CONTROL_URL)
            .form(&[
                ("api_key", key),
                ("api_secret", secret),
                ("request_id", request_id),
                ("cmd", "cancel"),
            ])
            .send()
            .await
            .map_err(vendor_err)?;
        Ok(())
    }

    /// Send an SMS from the configured sender id.
    pub async fn send_sms(&self, to: &str, text: &str) -> Result<SmsResult, VendorError> {
        let Some((key, secret)) = self.credentials() else {
            tracing::debug!(to = %to, "Mock SMS sent");
            return Ok(SmsResult {
                message_id: mock_id("mock_sms_"),
            });
        };

        let response = self
            .client
            .post(SMS_URL)
            .form(&[
                ("api_key", key),
                ("api_secret", secret),
                ("to", to),
                ("from", &self.config.sender_id),
                ("text", text),
            ])
            .send()
            .await
            .map_err(vendor_err)?;

        let parsed: SmsResponse = response
            .json()
            .await
            .map_err(|e| VendorError::InvalidResponse {
                vendor: "vonage".to_string(),
                reason: e.to_string(),
            })?;

        let message = parsed
            .messages
            .into_iter()
            .next()
            .ok_or_else(|| VendorError::InvalidResponse {
                vendor: "vonage".to_string(),
                reason: "empty message list".to_string(),
            })?;

        if message.status != "0" {
            return Err(VendorError::Rejected {
                vendor: "vonage".to_string(),
                status: 200,
                message: message
                    .error_text
                    .unwrap_or_else(|| format!("sms status {}", message.status)),
            });
        }
        Ok(SmsResult {
            message_id: message.message_id.unwrap_or_else(|| mock_id("sms_")),
        })
    }

    /// Create a video session for a welcome call.
    ///
    /// Only mocked sessions are produced unless the separate video API
    /// credentials are configured.
    pub async fn create_video_session(&self) -> Result<VideoSession, VendorError> {
        if self.config.video_api_key.is_none() || self.config.video_api_secret.is_none() {
            tracing::debug!("Mock video session created");
            return Ok(VideoSession {
                session_id: mock_id("mock_session_"),
                token: Uuid::new_v4().to_string(),
            });
        }

        let secret = self
            .config
            .video_api_secret
            .as_ref()
            .ok_or_else(|| VendorError::NotConfigured {
                vendor: "vonage video".to_string(),
            })?;

        let response = self
            .client
            .post("https://video.api.vonage.com/session/create")
            .bearer_auth(secret.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(vendor_err)?;

        #[derive(Deserialize)]
        struct SessionCreated {
            session_id: String,
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VendorError::Rejected {
                vendor: "vonage video".to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        let created: Vec<SessionCreated> =
            response
                .json()
                .await
                .map_err(|e| VendorError::InvalidResponse {
                    vendor: "vonage video".to_string(),
                    reason: e.to_string(),
                })?;
        let session = created
            .into_iter()
            .next()
            .ok_or_else(|| VendorError::InvalidResponse {
                vendor: "vonage video".to_string(),
                reason: "empty session list".to_string(),
            })?;

        Ok(VideoSession {
            session_id: session.session_id,
            token: Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_client() -> VonageClient {
        VonageClient::new(VonageConfig {
            api_key: String::new(),
            api_secret: None,
            brand_name: "OnboardIQ".into(),
            sender_id: "OnboardIQ".into(),
            video_api_key: None,
            video_api_secret: None,
        })
    }

    #[tokio::test]
    async fn test_mock_verification_flow() {
        let client = mock_client();
        assert!(client.is_mock());

        let start = client.start_verification("+15551234567").await.unwrap();
        assert!(start.request_id.starts_with("mock_verify_"));

        assert!(client
            .check_verification(&start.request_id, MOCK_VERIFY_CODE)
            .await
            .unwrap());
        assert!(!client
            .check_verification(&start.request_id, "000000")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_mock_sms_and_video() {
        let client = mock_client();
        let sms = client.send_sms("+15551234567", "hello").await.unwrap();
        assert!(sms.message_id.starts_with("mock_sms_"));

        let video = client.create_video_session().await.unwrap();
        assert!(video.session_id.starts_with("mock_session_"));
        assert!(!video.token.is_empty());
    }
}
