//! SMTP delivery for the rendered newsletter

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::Settings;
use crate::error::NewsletterError;
use crate::Result;

const PLAIN_FALLBACK: &str = "This is an HTML newsletter. Please use an HTML-enabled client.";

/// Send the newsletter over SMTP with STARTTLS.
pub async fn send_email(
    settings: &Settings,
    subject: &str,
    html: &str,
    to: &[String],
) -> Result<()> {
    let (host, username, password, from) = match (
        &settings.smtp_host,
        &settings.smtp_username,
        &settings.smtp_password,
        &settings.smtp_from,
    ) {
        (Some(host), Some(username), Some(password), Some(from)) => {
            (host, username, password, from)
        }
        _ => {
            return Err(NewsletterError::Configuration(
                "SMTP settings incomplete: set SMTP host, username, password, and from address"
                    .to_string(),
            ))
        }
    };

    if to.is_empty() {
        return Err(NewsletterError::Configuration(
            "No email recipients provided".to_string(),
        ));
    }

    let from_mailbox: Mailbox = from.parse().map_err(|e| {
        NewsletterError::Configuration(format!("Invalid from address {}: {}", from, e))
    })?;

    let mut builder = Message::builder().from(from_mailbox).subject(subject);
    for addr in to {
        let mailbox: Mailbox = addr.parse().map_err(|e| {
            NewsletterError::Configuration(format!("Invalid recipient {}: {}", addr, e))
        })?;
        builder = builder.to(mailbox);
    }

    let message = builder
        .multipart(MultiPart::alternative_plain_html(
            PLAIN_FALLBACK.to_string(),
            html.to_string(),
        ))
        .map_err(|e| NewsletterError::Transport(format!("Failed to build message: {}", e)))?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        .map_err(|e| NewsletterError::Transport(format!("SMTP relay setup failed: {}", e)))?
        .port(settings.smtp_port)
        .credentials(Credentials::new(username.clone(), password.clone()))
        .build();

    info!(host = %host, recipients = to.len(), "Sending newsletter email");

    transport
        .send(message)
        .await
        .map_err(|e| NewsletterError::Transport(format!("SMTP send failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_settings() -> Settings {
        Settings {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_username: Some("sender".to_string()),
            smtp_password: Some("secret".to_string()),
            smtp_from: Some("news@example.com".to_string()),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_incomplete_settings_is_configuration_error() {
        let settings = Settings::default();
        let err = send_email(&settings, "Subject", "<p>x</p>", &["a@b.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, NewsletterError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_no_recipients_is_configuration_error() {
        let err = send_email(&smtp_settings(), "Subject", "<p>x</p>", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NewsletterError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_configuration_error() {
        let err = send_email(
            &smtp_settings(),
            "Subject",
            "<p>x</p>",
            &["not an address".to_string()],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NewsletterError::Configuration(_)));
    }
}
