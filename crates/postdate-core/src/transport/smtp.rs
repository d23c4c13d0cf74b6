//! SMTP transport backed by lettre.

use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{MailTransport, OutgoingMessage, Security, SmtpConfig, TransportError};

/// Sends letters through a configured SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from SMTP settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender address does not parse or the relay
    /// configuration is rejected.
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;

        let mut builder = match config.security {
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| TransportError::Connection(e.to_string()))?,
            Security::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| TransportError::Connection(e.to_string()))?
            }
            Security::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let port = if config.port == 0 {
            SmtpConfig::default_port(config.security)
        } else {
            config.port
        };
        builder = builder.port(port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl MailTransport for SmtpMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject);

        let email = match &message.html {
            Some(html) => builder
                .multipart(MultiPart::alternative_plain_html(
                    message.text.clone(),
                    html.clone(),
                ))
                .map_err(|e| TransportError::Send(e.to_string()))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.text.clone())
                .map_err(|e| TransportError::Send(e.to_string()))?,
        };

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        debug!(to = %message.to, code = %response.code(), "message accepted by relay");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 0,
            security: Security::StartTls,
            username: "user@example.com".to_string(),
            password: "secret".to_string(),
            from: "Postdate <letters@example.com>".to_string(),
        }
    }

    #[test]
    fn test_new_accepts_valid_config() {
        assert!(SmtpMailer::new(&config()).is_ok());
    }

    #[test]
    fn test_new_rejects_bad_sender() {
        let mut config = config();
        config.from = "not an address".to_string();
        assert!(matches!(
            SmtpMailer::new(&config),
            Err(TransportError::InvalidAddress(_))
        ));
    }
}
