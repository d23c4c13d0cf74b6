//! Letter data models.

use chrono::{DateTime, Utc};

/// Maximum content length for a plaintext letter, in characters.
pub const MAX_PLAINTEXT_CHARS: usize = 3000;

/// Maximum content length for an encrypted envelope, in characters.
///
/// Higher than the plaintext ceiling to leave room for Base64 expansion and
/// the envelope metadata.
pub const MAX_ENVELOPE_CHARS: usize = 12_000;

/// Unique identifier for a stored letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LetterId(pub i64);

impl LetterId {
    /// Create a new letter ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LetterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a letter.
///
/// A letter is created `Pending` and leaves that state through exactly one
/// outcome write per dispatch attempt. There is no transition out of `Sent`
/// or `Failed` short of an operator resetting the row by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LetterStatus {
    /// Waiting for its scheduled time.
    #[default]
    Pending,
    /// Handed to the mail transport successfully.
    Sent,
    /// The last dispatch attempt failed; see the stored error text.
    Failed,
}

impl LetterStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for LetterStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// The terminal result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The transport accepted the message.
    Sent,
    /// The transport rejected or failed; carries the error text to persist.
    Failed(String),
}

/// A stored letter awaiting (or past) delivery.
#[derive(Debug, Clone)]
pub struct Letter {
    /// Surrogate primary key, assigned on insert.
    pub id: LetterId,
    /// Letter body: raw plaintext, or the JSON envelope when
    /// `is_encrypted` is set.
    pub content: String,
    /// Delivery address.
    pub recipient_email: String,
    /// The instant the letter becomes due (UTC).
    pub scheduled_time: DateTime<Utc>,
    /// Current delivery state.
    pub status: LetterStatus,
    /// Whether `content` is a sealed envelope rather than plaintext.
    pub is_encrypted: bool,
    /// When the letter was stored.
    pub created_at: DateTime<Utc>,
    /// When the letter was handed to the transport, once sent.
    pub sent_at: Option<DateTime<Utc>>,
    /// Error text from the most recent failed attempt, if any.
    pub error_message: Option<String>,
}

impl Letter {
    /// Returns true if the letter is due for delivery at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == LetterStatus::Pending && self.scheduled_time <= now
    }
}

/// A letter that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewLetter {
    /// Letter body (plaintext or envelope JSON).
    pub content: String,
    /// Delivery address.
    pub recipient_email: String,
    /// The instant the letter becomes due (UTC).
    pub scheduled_time: DateTime<Utc>,
    /// Whether `content` is a sealed envelope.
    pub is_encrypted: bool,
}

impl NewLetter {
    /// Creates a plaintext letter.
    #[must_use]
    pub fn plaintext(
        content: impl Into<String>,
        recipient_email: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            recipient_email: recipient_email.into(),
            scheduled_time,
            is_encrypted: false,
        }
    }

    /// Creates a letter whose content is a client-built envelope.
    #[must_use]
    pub fn encrypted(
        content: impl Into<String>,
        recipient_email: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            recipient_email: recipient_email.into(),
            scheduled_time,
            is_encrypted: true,
        }
    }

    /// Content ceiling for this letter's kind, in characters.
    #[must_use]
    pub const fn max_chars(&self) -> usize {
        if self.is_encrypted {
            MAX_ENVELOPE_CHARS
        } else {
            MAX_PLAINTEXT_CHARS
        }
    }
}
