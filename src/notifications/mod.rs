//! Outbound email for membership lifecycle events.
//!
//! Sending is opt-in: without an SMTP relay and sender address in the
//! config, every send is a logged no-op. Failures never surface to API
//! clients; callers log and move on.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[derive(Clone)]
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Confirmation sent right after a registration is accepted
    pub async fn send_registration_received(&self, to_email: &str, name: &str) -> Result<()> {
        let subject = "We received your registration";
        let text_body = format!(
            "Hi {name},\n\nThanks for registering! Your membership is now waiting for \
             verification by an administrator. You will hear from us once it has been \
             reviewed.\n\n— The association team"
        );
        let html_body = format!(
            "<p>Hi {name},</p>\
             <p>Thanks for registering! Your membership is now waiting for verification \
             by an administrator. You will hear from us once it has been reviewed.</p>\
             <p>— The association team</p>"
        );

        self.send(to_email, subject, &html_body, &text_body).await
    }

    /// Sent when an admin approves the membership
    pub async fn send_membership_approved(&self, to_email: &str, name: &str) -> Result<()> {
        let subject = "Your membership has been approved";
        let text_body = format!(
            "Hi {name},\n\nGood news: your membership has been approved. You can now \
             log in and register for events.\n\n— The association team"
        );
        let html_body = format!(
            "<p>Hi {name},</p>\
             <p>Good news: your membership has been approved. You can now log in and \
             register for events.</p>\
             <p>— The association team</p>"
        );

        self.send(to_email, subject, &html_body, &text_body).await
    }

    /// Send an email with HTML and plain text versions
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping email to {}", to_email);
            return Ok(());
        }

        let smtp_host = self
            .config
            .host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.username, &self.config.password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, subject = %subject, "Email sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_mailer_is_a_no_op() {
        let mailer = Mailer::new(SmtpConfig::default());
        assert!(!mailer.is_enabled());
        // Skips without attempting a connection
        assert!(mailer
            .send_registration_received("someone@example.com", "Someone")
            .await
            .is_ok());
    }
}
