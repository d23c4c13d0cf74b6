//! # postdate-core
//!
//! Scheduled delivery engine for `postdate`, a service that delivers letters
//! "to the future" by email at a user-chosen instant.
//!
//! This crate provides:
//! - Letter storage (`SQLite`) with the pending/sent/failed state machine
//! - The client-encrypted envelope codec and capability links
//! - Delivery rendering (plaintext letters and encrypted-letter notices)
//! - The recurring scheduler that finds due letters and dispatches them
//! - An SMTP mail transport and the trait it implements
//!
//! The HTTP layer that accepts letters and the browser-side encryption and
//! decryption pages are separate deployments; they interact with this crate
//! only through [`LetterRepository`] and the envelope wire format.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod delivery;
pub mod envelope;
mod error;
pub mod letter;
pub mod transport;

pub use delivery::{RenderedMail, Scheduler, SchedulerHandle, TICK_PERIOD, render};
pub use envelope::{DecodeError, DecodedContent, EncryptedContent, Envelope, decode};
pub use error::{Error, Result};
pub use letter::{
    DeliveryOutcome, Letter, LetterId, LetterRepository, LetterStatus, NewLetter, ValidationError,
    ValidationResult, validate_letter,
};
pub use transport::{
    MailTransport, OutgoingMessage, Security, SmtpConfig, SmtpMailer, TransportError,
};
