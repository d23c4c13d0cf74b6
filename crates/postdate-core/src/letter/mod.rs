//! Letter storage and lifecycle.
//!
//! A letter is the sole persistent entity of the delivery engine: the
//! message body (plaintext or sealed envelope), its recipient, the instant
//! it becomes due, and the pending/sent/failed state machine.

mod model;
mod repository;
mod validation;

pub use model::{
    DeliveryOutcome, Letter, LetterId, LetterStatus, MAX_ENVELOPE_CHARS, MAX_PLAINTEXT_CHARS,
    NewLetter,
};
pub use repository::LetterRepository;
pub use validation::{ValidationError, ValidationResult, validate_letter};
