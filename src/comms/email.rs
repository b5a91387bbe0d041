//! SMTP delivery for generated documents.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::error::VendorError;

/// Sends email over SMTP. A missing configuration disables sending; calls
/// then report `NotConfigured` so callers can record the skip.
pub struct EmailSender {
    config: Option<SmtpConfig>,
}

fn vendor_err(reason: impl ToString) -> VendorError {
    VendorError::RequestFailed {
        vendor: "smtp".to_string(),
        reason: reason.to_string(),
    }
}

impl EmailSender {
    pub fn new(config: Option<SmtpConfig>) -> Self {
        if config.is_none() {
            tracing::warn!("SMTP not configured; email delivery disabled");
        }
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Send a plain-text email. The SMTP handshake is blocking, so it runs
    /// on the blocking pool.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), VendorError> {
        let Some(config) = self.config.clone() else {
            return Err(VendorError::NotConfigured {
                vendor: "smtp".to_string(),
            });
        };

        let to = to.to_string();
        let subject = subject.to_string();
        let body = body.to_string();

        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&config.host)
                .map_err(vendor_err)?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build();

            let message = Message::builder()
                .from(config.from_address.parse().map_err(vendor_err)?)
                .to(to.parse().map_err(vendor_err)?)
                .subject(subject)
                .body(body)
                .map_err(vendor_err)?;

            transport.send(&message).map_err(vendor_err)?;
            Ok(())
        })
        .await
        .map_err(vendor_err)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_sender_reports_not_configured() {
        let sender = EmailSender::new(None);
        assert!(!sender.is_enabled());
        let result = sender.send("user@example.com", "hi", "body").await;
        assert!(matches!(result, Err(VendorError::NotConfigured { .. })));
    }
}
