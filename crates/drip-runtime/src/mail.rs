use std::sync::Arc;

use async_trait::async_trait;

use drip_core::config::MailConfig;
use drip_core::error::{DripError, Result};
use drip_core::mail::Email;
use drip_core::store::{DomainRegistry, MailSender};

/// Delivers mail by logging it, after checking the sender domain.
///
/// The system domain is always allowed. Any other sender domain must be
/// verified in the domain registry.
pub struct LogMailSender {
    domains: Arc<dyn DomainRegistry>,
    system_domain: String,
}

impl LogMailSender {
    pub fn new(domains: Arc<dyn DomainRegistry>, config: &MailConfig) -> Self {
        Self {
            domains,
            system_domain: config.system_domain.clone(),
        }
    }

    async fn authorize(&self, domain: &str) -> Result<()> {
        if domain.eq_ignore_ascii_case(&self.system_domain) {
            return Ok(());
        }

        let verified = self
            .domains
            .is_domain_verified(domain)
            .await
            .map_err(|e| DripError::Mail(format!("failed to check domain verification: {}", e)))?;

        if verified {
            Ok(())
        } else {
            Err(DripError::Mail(format!(
                "sender domain '{}' is not verified",
                domain
            )))
        }
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send_email(&self, email: &Email) -> Result<()> {
        let domain = email.sender_domain()?;
        self.authorize(domain).await?;

        tracing::info!(
            to = %email.to,
            from = %email.from,
            subject = %email.subject,
            body_len = email.body.len(),
            "Sending email"
        );
        Ok(())
    }
}
