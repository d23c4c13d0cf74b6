//! Mail transport for outbound delivery.
//!
//! The scheduler talks to the transport through [`MailTransport`], so tests
//! can substitute a scripted transport; production uses [`SmtpMailer`].

mod smtp;

pub use smtp::SmtpMailer;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection or transport setup failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Send failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// Invalid address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// An email message to send.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// HTML body, when a rendered alternative exists.
    pub html: Option<String>,
}

impl OutgoingMessage {
    /// Creates a new text-only message.
    #[must_use]
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
        }
    }

    /// Adds an HTML alternative body.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// A mail delivery backend.
///
/// One call sends one message; any error is reported for that message alone
/// and its text becomes the letter's stored error message.
pub trait MailTransport: Send + Sync {
    /// Send a single message.
    fn send(
        &self,
        message: &OutgoingMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Security/encryption mode for SMTP connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    #[default]
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

/// SMTP server configuration.
#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 465 for TLS, 587 for STARTTLS).
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication; empty to skip authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Sender address for outbound letters.
    pub from: String,
}

impl SmtpConfig {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::None => 25,
            Security::StartTls => 587,
            Security::Tls => 465,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(SmtpConfig::default_port(Security::None), 25);
        assert_eq!(SmtpConfig::default_port(Security::StartTls), 587);
        assert_eq!(SmtpConfig::default_port(Security::Tls), 465);
    }

    #[test]
    fn test_default_security_is_starttls() {
        assert_eq!(Security::default(), Security::StartTls);
    }

    #[test]
    fn test_outgoing_message_builder() {
        let message = OutgoingMessage::new("to@example.com", "Subject", "body").html("<p>body</p>");
        assert_eq!(message.to, "to@example.com");
        assert_eq!(message.html.as_deref(), Some("<p>body</p>"));
    }
}
