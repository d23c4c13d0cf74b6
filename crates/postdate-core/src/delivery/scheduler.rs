//! The recurring delivery scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::render::render;
use crate::letter::{DeliveryOutcome, Letter, LetterRepository};
use crate::transport::{MailTransport, OutgoingMessage};

/// How often the scheduler checks for due letters.
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// The recurring driver that delivers due letters.
///
/// Each tick takes a snapshot of the due set and works through it strictly
/// sequentially: one letter's send and outcome write complete before the
/// next begins, so at most one transport call is in flight. A failure on
/// one letter never aborts the rest of the tick.
pub struct Scheduler<T> {
    repository: Arc<LetterRepository>,
    transport: Arc<T>,
    base_url: String,
    period: Duration,
}

impl<T: MailTransport + 'static> Scheduler<T> {
    /// Create a scheduler over the given store and transport.
    ///
    /// `base_url` is the public origin used to build capability links for
    /// sealed letters.
    #[must_use]
    pub fn new(
        repository: Arc<LetterRepository>,
        transport: Arc<T>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            transport,
            base_url: base_url.into(),
            period: TICK_PERIOD,
        }
    }

    /// Override the tick period.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start the recurring loop.
    ///
    /// Consumes the scheduler; the returned handle is the only proof of the
    /// running loop, so a second loop over the same scheduler cannot exist.
    /// The first tick fires immediately, catching up on letters that came
    /// due while the process was down.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), "letter scheduler started");
            let mut interval = tokio::time::interval(self.period);
            // A tick that overruns its period delays the next one instead
            // of bursting to catch up.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => self.tick(Utc::now()).await,
                    _ = shutdown_rx.changed() => {
                        info!("letter scheduler stopped");
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Run a single check-and-dispatch pass against `now`.
    ///
    /// A failure to fetch the due set abandons the whole tick; the next
    /// tick proceeds normally.
    pub async fn tick(&self, now: DateTime<Utc>) {
        debug!("checking for due letters");

        let due = match self.repository.fetch_due(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("failed to fetch due letters, abandoning tick: {e}");
                return;
            }
        };

        if due.is_empty() {
            debug!("no letters due");
            return;
        }

        info!("found {} letter(s) to deliver", due.len());

        for letter in due {
            if let Err(e) = self.deliver(&letter).await {
                // The letter keeps whatever status it already had; if the
                // transport had succeeded it will be sent again next tick.
                error!(letter = %letter.id, "could not record delivery outcome: {e}");
            }
        }
    }

    /// Send one letter and record the outcome.
    async fn deliver(&self, letter: &Letter) -> crate::Result<()> {
        let mail = render(letter, &self.base_url);
        let mut message = OutgoingMessage::new(&letter.recipient_email, mail.subject, mail.text);
        if let Some(html) = mail.html {
            message = message.html(html);
        }

        match self.transport.send(&message).await {
            Ok(()) => {
                info!(letter = %letter.id, "letter delivered");
                self.repository
                    .mark_outcome(letter.id, DeliveryOutcome::Sent)
                    .await
            }
            Err(e) => {
                warn!(letter = %letter.id, "delivery failed: {e}");
                self.repository
                    .mark_outcome(letter.id, DeliveryOutcome::Failed(e.to_string()))
                    .await
            }
        }
    }
}

/// Owner handle for a running scheduler loop.
///
/// Holding the handle is what proves a loop is running. Dropping it signals
/// the loop to stop without waiting; [`Self::stop`] also waits for an
/// in-flight tick to finish.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to finish.
    ///
    /// An in-flight tick completes before the task exits; no send is
    /// cancelled halfway.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("scheduler task failed: {e}");
        }
    }
}
