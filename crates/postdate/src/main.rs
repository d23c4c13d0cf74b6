//! `postdate` — deliver letters to the future.
//!
//! Runs the delivery scheduler as a foreground daemon and provides a small
//! operator CLI over the same letter store.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io::Read as _;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postdate_core::{
    LetterRepository, NewLetter, Scheduler, Security, SmtpConfig, SmtpMailer, validate_letter,
};

#[derive(Parser)]
#[command(
    name = "postdate",
    about = "Deliver letters to the future by scheduled email",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the letter database
    #[arg(long, env = "POSTDATE_DB", default_value = "letters.db")]
    database: String,

    /// Public base URL used in capability links for sealed letters
    #[arg(long, env = "POSTDATE_BASE_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// SMTP server hostname
    #[arg(long, env = "SMTP_HOST", default_value = "localhost")]
    smtp_host: String,

    /// SMTP server port (0 = default for the security mode)
    #[arg(long, env = "SMTP_PORT", default_value_t = 0)]
    smtp_port: u16,

    /// Use implicit TLS instead of STARTTLS
    #[arg(long, env = "SMTP_SECURE", default_value_t = false)]
    smtp_secure: bool,

    /// SMTP username (empty = unauthenticated relay)
    #[arg(long, env = "SMTP_USER", default_value = "")]
    smtp_user: String,

    /// SMTP password
    #[arg(long, env = "SMTP_PASS", default_value = "", hide_env_values = true)]
    smtp_pass: String,

    /// Sender address for outbound letters (defaults to the SMTP username)
    #[arg(long, env = "SMTP_FROM", default_value = "")]
    smtp_from: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the delivery scheduler in the foreground (default).
    Serve {
        /// Enable the recurring scheduler
        #[arg(
            long,
            env = "ENABLE_SCHEDULER",
            default_value_t = true,
            action = clap::ArgAction::Set
        )]
        scheduler: bool,
    },
    /// List letters still waiting for their scheduled time.
    List,
    /// Run one delivery pass immediately and exit.
    Flush,
    /// Store a new letter, reading its content from stdin.
    Queue {
        /// Recipient email address
        #[arg(long)]
        to: String,

        /// Delivery instant, RFC 3339 (e.g. 2030-01-01T09:00:00Z)
        #[arg(long)]
        at: String,

        /// Treat the content as a pre-built encrypted envelope
        #[arg(long)]
        encrypted: bool,
    },
}

impl Args {
    fn smtp_config(&self) -> SmtpConfig {
        let from = if self.smtp_from.is_empty() {
            self.smtp_user.clone()
        } else {
            self.smtp_from.clone()
        };

        SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            security: if self.smtp_secure {
                Security::Tls
            } else {
                Security::StartTls
            },
            username: self.smtp_user.clone(),
            password: self.smtp_pass.clone(),
            from,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postdate=info,postdate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = Args::parse();

    let repository = Arc::new(
        LetterRepository::new(&args.database)
            .await
            .with_context(|| format!("could not open letter database at {}", args.database))?,
    );

    match args.command.take() {
        None | Some(Command::Serve { scheduler: true }) => serve(&args, repository).await,
        Some(Command::Serve { scheduler: false }) => {
            warn!("scheduler disabled; letters will not be delivered until it is enabled");
            tokio::signal::ctrl_c()
                .await
                .context("failed to wait for shutdown signal")?;
            Ok(())
        }
        Some(Command::List) => list(repository).await,
        Some(Command::Flush) => flush(&args, repository).await,
        Some(Command::Queue { to, at, encrypted }) => {
            queue(repository, &to, &at, encrypted).await
        }
    }
}

/// Run the scheduler until interrupted.
async fn serve(args: &Args, repository: Arc<LetterRepository>) -> Result<()> {
    let mailer =
        Arc::new(SmtpMailer::new(&args.smtp_config()).context("invalid SMTP configuration")?);

    info!(
        database = %args.database,
        smtp = %args.smtp_host,
        "postdate starting"
    );

    let handle = Scheduler::new(repository, mailer, args.base_url.clone()).start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    info!("shutting down");
    handle.stop().await;

    Ok(())
}

/// Print the pending letters.
async fn list(repository: Arc<LetterRepository>) -> Result<()> {
    let pending = repository
        .list_pending()
        .await
        .context("could not list pending letters")?;

    if pending.is_empty() {
        println!("No pending letters.");
        return Ok(());
    }

    println!("{:>6}  {:<25}  {:<25}  {}", "id", "scheduled", "recipient", "kind");
    for letter in pending {
        println!(
            "{:>6}  {:<25}  {:<25}  {}",
            letter.id,
            letter.scheduled_time.format("%Y-%m-%d %H:%M:%S UTC"),
            letter.recipient_email,
            if letter.is_encrypted { "sealed" } else { "plaintext" },
        );
    }

    Ok(())
}

/// Run a single delivery pass.
async fn flush(args: &Args, repository: Arc<LetterRepository>) -> Result<()> {
    let mailer =
        Arc::new(SmtpMailer::new(&args.smtp_config()).context("invalid SMTP configuration")?);

    Scheduler::new(repository, mailer, args.base_url.clone())
        .tick(Utc::now())
        .await;

    Ok(())
}

/// Validate and store a letter read from stdin.
async fn queue(
    repository: Arc<LetterRepository>,
    to: &str,
    at: &str,
    encrypted: bool,
) -> Result<()> {
    let scheduled_time = DateTime::parse_from_rfc3339(at)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("'{at}' is not an RFC 3339 timestamp"))?;

    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("could not read letter content from stdin")?;
    let content = content.trim_end().to_string();

    let letter = if encrypted {
        NewLetter::encrypted(content, to, scheduled_time)
    } else {
        NewLetter::plaintext(content, to, scheduled_time)
    };

    if let Err(errors) = validate_letter(&letter, Utc::now()) {
        for error in &errors {
            eprintln!("{}: {}", error.field(), error.message());
        }
        bail!("letter rejected");
    }

    let id = repository
        .insert(&letter)
        .await
        .context("could not store letter")?;

    println!(
        "Letter {id} sealed; it will be delivered to {to} at {}.",
        scheduled_time.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}
