//! Delivery of due letters.
//!
//! [`render`] turns a stored letter into the outbound mail bodies;
//! [`Scheduler`] is the recurring driver that finds due letters, sends
//! them, and records the outcome.

mod render;
mod scheduler;

pub use render::{RenderedMail, SUBJECT, render};
pub use scheduler::{Scheduler, SchedulerHandle, TICK_PERIOD};
