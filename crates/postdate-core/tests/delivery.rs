//! End-to-end delivery tests.
//!
//! These drive the scheduler against an in-memory store and a scripted
//! transport, covering the full path from stored letter to recorded
//! outcome without a real SMTP server.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use percent_encoding::percent_decode_str;
use postdate_core::envelope::{ALGORITHM, EncryptedContent, Envelope, KDF};
use postdate_core::{
    LetterRepository, LetterStatus, MailTransport, NewLetter, OutgoingMessage, Scheduler,
    TransportError,
};

/// Transport that records messages and optionally fails every send.
#[derive(Default)]
struct ScriptedTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
    failure: Option<String>,
}

impl ScriptedTransport {
    fn failing_with(error: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(error.to_string()),
        }
    }

    fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for ScriptedTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        if let Some(error) = &self.failure {
            return Err(TransportError::Send(error.clone()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn scheduler(
    repository: &Arc<LetterRepository>,
    transport: &Arc<ScriptedTransport>,
) -> Scheduler<ScriptedTransport> {
    Scheduler::new(
        Arc::clone(repository),
        Arc::clone(transport),
        "http://localhost:3000",
    )
}

fn sealed_envelope() -> Envelope {
    Envelope {
        version: 1,
        encrypted: EncryptedContent {
            ciphertext: "c2VhbGVkIGxldHRlciBib2R5+/==".to_string(),
            iv: "aXZpdml2aXZpdg==".to_string(),
            salt: "c2FsdHNhbHRzYWx0c2FsdA==".to_string(),
            algorithm: ALGORITHM.to_string(),
            kdf: KDF.to_string(),
            iterations: Some(100_000),
        },
    }
}

/// Scenario A: a plaintext letter due in the past is sent by one tick.
#[tokio::test]
async fn plaintext_letter_due_in_past_is_sent() {
    let repo = Arc::new(LetterRepository::in_memory().await.unwrap());
    let transport = Arc::new(ScriptedTransport::default());
    let now = Utc::now();

    let id = repo
        .insert(&NewLetter::plaintext(
            "Dear future me, it worked.",
            "me@example.com",
            now - Duration::minutes(1),
        ))
        .await
        .unwrap();

    scheduler(&repo, &transport).tick(now).await;

    let letter = repo.get(id).await.unwrap().unwrap();
    assert_eq!(letter.status, LetterStatus::Sent);
    assert!(letter.sent_at.is_some());
    assert!(letter.error_message.is_none());

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "me@example.com");
    assert_eq!(sent[0].text, "Dear future me, it worked.");
}

/// Scenario B: a sealed letter's outbound body carries the capability URL
/// whose query values decode back to the stored envelope fields.
#[tokio::test]
async fn sealed_letter_body_carries_matching_capability_url() {
    let repo = Arc::new(LetterRepository::in_memory().await.unwrap());
    let transport = Arc::new(ScriptedTransport::default());
    let now = Utc::now();
    let envelope = sealed_envelope();

    repo.insert(&NewLetter::encrypted(
        envelope.to_json().unwrap(),
        "me@example.com",
        now,
    ))
    .await
    .unwrap();

    scheduler(&repo, &transport).tick(now).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let body = &sent[0].text;

    // Pull the capability URL out of the body and re-extract its query.
    let url = body
        .lines()
        .find(|line| line.starts_with("http://localhost:3000/decrypt?"))
        .unwrap();
    let query = url.split_once('?').unwrap().1;

    let mut c = None;
    let mut i = None;
    let mut s = None;
    let mut iter = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap();
        let decoded = percent_decode_str(value).decode_utf8().unwrap().into_owned();
        match key {
            "c" => c = Some(decoded),
            "i" => i = Some(decoded),
            "s" => s = Some(decoded),
            "iter" => iter = Some(decoded),
            _ => panic!("unexpected query key {key}"),
        }
    }

    assert_eq!(c.unwrap(), envelope.encrypted.ciphertext);
    assert_eq!(i.unwrap(), envelope.encrypted.iv);
    assert_eq!(s.unwrap(), envelope.encrypted.salt);
    assert_eq!(iter.unwrap(), "100000");
}

/// Scenario C: a transport failure marks the letter failed with the error
/// text, and `sent_at` stays null.
#[tokio::test]
async fn transport_failure_is_recorded() {
    let repo = Arc::new(LetterRepository::in_memory().await.unwrap());
    let transport = Arc::new(ScriptedTransport::failing_with("SMTP timeout"));
    let now = Utc::now();

    let id = repo
        .insert(&NewLetter::plaintext(
            "hello",
            "me@example.com",
            now - Duration::seconds(1),
        ))
        .await
        .unwrap();

    scheduler(&repo, &transport).tick(now).await;

    let letter = repo.get(id).await.unwrap().unwrap();
    assert_eq!(letter.status, LetterStatus::Failed);
    assert!(letter.sent_at.is_none());
    assert!(
        letter
            .error_message
            .as_deref()
            .unwrap()
            .contains("SMTP timeout")
    );
}

/// Scenario D: of two letters, only the one already due leaves `pending`.
#[tokio::test]
async fn only_due_letters_transition() {
    let repo = Arc::new(LetterRepository::in_memory().await.unwrap());
    let transport = Arc::new(ScriptedTransport::default());
    let now = Utc::now();

    let due = repo
        .insert(&NewLetter::plaintext(
            "now",
            "a@example.com",
            now - Duration::seconds(30),
        ))
        .await
        .unwrap();
    let future = repo
        .insert(&NewLetter::plaintext(
            "later",
            "b@example.com",
            now + Duration::minutes(10),
        ))
        .await
        .unwrap();

    scheduler(&repo, &transport).tick(now).await;

    assert_eq!(
        repo.get(due).await.unwrap().unwrap().status,
        LetterStatus::Sent
    );
    assert_eq!(
        repo.get(future).await.unwrap().unwrap().status,
        LetterStatus::Pending
    );
}

/// A tick never leaves a due letter pending: each one ends up sent or
/// failed, even when every send fails.
#[tokio::test]
async fn tick_resolves_every_due_letter() {
    let repo = Arc::new(LetterRepository::in_memory().await.unwrap());
    let transport = Arc::new(ScriptedTransport::failing_with("connection refused"));
    let now = Utc::now();

    for n in 0..5 {
        repo.insert(&NewLetter::plaintext(
            format!("letter {n}"),
            format!("r{n}@example.com"),
            now - Duration::minutes(n),
        ))
        .await
        .unwrap();
    }

    scheduler(&repo, &transport).tick(now).await;

    assert!(repo.fetch_due(now).await.unwrap().is_empty());
    assert!(repo.list_pending().await.unwrap().is_empty());
}

/// A sealed letter with unreadable content still goes out as the fixed
/// notice and is marked sent; the malformed text is never mailed.
#[tokio::test]
async fn malformed_envelope_ships_notice_and_counts_as_sent() {
    let repo = Arc::new(LetterRepository::in_memory().await.unwrap());
    let transport = Arc::new(ScriptedTransport::default());
    let now = Utc::now();

    let id = repo
        .insert(&NewLetter::encrypted(
            "{\"version\":9,\"oops\":true}",
            "me@example.com",
            now - Duration::minutes(1),
        ))
        .await
        .unwrap();

    scheduler(&repo, &transport).tick(now).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].text.contains("oops"));
    assert!(sent[0].text.contains("could not be prepared"));

    let letter = repo.get(id).await.unwrap().unwrap();
    assert_eq!(letter.status, LetterStatus::Sent);
}
