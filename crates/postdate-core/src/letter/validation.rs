//! Letter validation for the creation interface.
//!
//! The repository itself only enforces storage ceilings; callers accepting
//! letters from users (HTTP layer, CLI) run these checks first.

use chrono::{DateTime, Utc};

use super::model::NewLetter;

/// Validation error for a letter submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Letter content is empty.
    EmptyContent,
    /// Letter content exceeds the ceiling for its kind.
    ContentTooLong,
    /// Recipient address is empty.
    EmptyRecipient,
    /// Recipient address format is invalid.
    InvalidRecipient,
    /// Scheduled time is not in the future.
    ScheduledInPast,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyContent => "Letter content is required",
            Self::ContentTooLong => "Letter content exceeds the maximum length",
            Self::EmptyRecipient => "Recipient email is required",
            Self::InvalidRecipient => "Invalid recipient email format",
            Self::ScheduledInPast => "Scheduled time must be in the future",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyContent | Self::ContentTooLong => "content",
            Self::EmptyRecipient | Self::InvalidRecipient => "recipient_email",
            Self::ScheduledInPast => "scheduled_time",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a letter submission.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a letter submission against `now`.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_letter(letter: &NewLetter, now: DateTime<Utc>) -> ValidationResult {
    let mut errors = Vec::new();

    if letter.content.trim().is_empty() {
        errors.push(ValidationError::EmptyContent);
    } else if letter.content.chars().count() > letter.max_chars() {
        errors.push(ValidationError::ContentTooLong);
    }

    if letter.recipient_email.trim().is_empty() {
        errors.push(ValidationError::EmptyRecipient);
    } else if !is_valid_email(&letter.recipient_email) {
        errors.push(ValidationError::InvalidRecipient);
    }

    if letter.scheduled_time <= now {
        errors.push(ValidationError::ScheduledInPast);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    // Must contain exactly one @
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    // Local part must not be empty
    if local.is_empty() {
        return false;
    }

    // Domain must contain at least one dot and not be empty
    if domain.is_empty() || !domain.contains('.') {
        return false;
    }

    // Domain parts must not be empty
    let domain_parts: Vec<&str> = domain.split('.').collect();
    if domain_parts.iter().any(|p| p.is_empty()) {
        return false;
    }

    true
}
