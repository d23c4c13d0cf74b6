//! Letter storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use super::model::{DeliveryOutcome, Letter, LetterId, LetterStatus, NewLetter};
use crate::{Error, Result};

/// Repository for letter storage and retrieval.
pub struct LetterRepository {
    pool: SqlitePool,
}

impl LetterRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS letters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                recipient_email TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                is_encrypted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                sent_at TEXT,
                error_message TEXT,
                CHECK (length(content) <= 12000)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Index for the due-letter query
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_letters_status_scheduled
            ON letters(status, scheduled_time)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a new letter in the `pending` state.
    ///
    /// Returns the assigned id. Field validation (email shape, future-time
    /// check) is the caller's responsibility; only the per-kind content
    /// ceiling is enforced here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContentTooLong`] if the content exceeds the ceiling
    /// for its kind, or a database error if the insert fails.
    pub async fn insert(&self, letter: &NewLetter) -> Result<LetterId> {
        let actual = letter.content.chars().count();
        let limit = letter.max_chars();
        if actual > limit {
            return Err(Error::ContentTooLong { actual, limit });
        }

        let result = sqlx::query(
            r"
            INSERT INTO letters (content, recipient_email, scheduled_time, status, is_encrypted, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&letter.content)
        .bind(&letter.recipient_email)
        .bind(letter.scheduled_time.to_rfc3339())
        .bind(LetterStatus::Pending.as_str())
        .bind(letter.is_encrypted)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(LetterId::new(result.last_insert_rowid()))
    }

    /// Get all pending letters whose scheduled time is at or before `now`.
    ///
    /// The returned list is a snapshot taken at call time, ordered by
    /// scheduled time; letters that become due afterwards appear on the
    /// next call.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch_due(&self, now: DateTime<Utc>) -> Result<Vec<Letter>> {
        let rows = sqlx::query(
            r"
            SELECT id, content, recipient_email, scheduled_time, status,
                   is_encrypted, created_at, sent_at, error_message
            FROM letters
            WHERE status = ? AND scheduled_time <= ?
            ORDER BY scheduled_time ASC
            ",
        )
        .bind(LetterStatus::Pending.as_str())
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_letter).collect())
    }

    /// Record the terminal result of one dispatch attempt.
    ///
    /// Sets `status` and either `sent_at` (on success) or `error_message`
    /// (on failure) in a single row write. Calling it again for the same id
    /// overwrites the previous outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn mark_outcome(&self, id: LetterId, outcome: DeliveryOutcome) -> Result<()> {
        let (status, sent_at, error_message) = match outcome {
            DeliveryOutcome::Sent => (LetterStatus::Sent, Some(Utc::now().to_rfc3339()), None),
            DeliveryOutcome::Failed(text) => (LetterStatus::Failed, None, Some(text)),
        };

        sqlx::query(
            r"
            UPDATE letters SET status = ?, sent_at = ?, error_message = ?
            WHERE id = ?
            ",
        )
        .bind(status.as_str())
        .bind(sent_at)
        .bind(error_message)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a letter by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: LetterId) -> Result<Option<Letter>> {
        let row = sqlx::query(
            r"
            SELECT id, content, recipient_email, scheduled_time, status,
                   is_encrypted, created_at, sent_at, error_message
            FROM letters
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(row_to_letter))
    }

    /// List all letters still waiting for their scheduled time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_pending(&self) -> Result<Vec<Letter>> {
        let rows = sqlx::query(
            r"
            SELECT id, content, recipient_email, scheduled_time, status,
                   is_encrypted, created_at, sent_at, error_message
            FROM letters
            WHERE status = ?
            ORDER BY scheduled_time ASC
            ",
        )
        .bind(LetterStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_letter).collect())
    }
}

/// Convert a database row into a [`Letter`].
///
/// Rows with unparseable timestamps are skipped rather than failing the
/// whole query.
fn row_to_letter(row: &SqliteRow) -> Option<Letter> {
    let scheduled_time_str: String = row.get("scheduled_time");
    let created_at_str: String = row.get("created_at");
    let sent_at_str: Option<String> = row.get("sent_at");

    let scheduled_time = DateTime::parse_from_rfc3339(&scheduled_time_str)
        .ok()?
        .with_timezone(&Utc);
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .ok()?
        .with_timezone(&Utc);
    let sent_at = sent_at_str
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    Some(Letter {
        id: LetterId::new(row.get::<i64, _>("id")),
        content: row.get("content"),
        recipient_email: row.get("recipient_email"),
        scheduled_time,
        status: LetterStatus::parse(&row.get::<String, _>("status")),
        is_encrypted: row.get("is_encrypted"),
        created_at,
        sent_at,
        error_message: row.get("error_message"),
    })
}
