//! Outbound mail rendering.

use std::fmt::Write as _;

use tracing::warn;

use crate::envelope::{ALGORITHM, Envelope, KDF, KDF_HASH};
use crate::letter::Letter;

/// Subject line for delivered letters.
pub const SUBJECT: &str = "A letter from the past";

/// Text body used when a sealed letter's envelope cannot be read.
const UNREADABLE_TEXT: &str = "A letter addressed to you was scheduled for delivery today, but it \
was stored in a sealed form that could not be prepared for sending. The letter itself has not \
been lost; please contact the operator of the service that delivered this notice.";

/// The rendered bodies for one outbound letter.
#[derive(Debug, Clone)]
pub struct RenderedMail {
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// HTML alternative body.
    pub html: Option<String>,
}

/// Render the outbound mail for a letter.
///
/// Plaintext letters ship their content verbatim. Sealed letters ship a
/// capability link plus the raw decryption parameters as a manual fallback;
/// if the envelope cannot be read, a fixed notice is rendered instead so
/// the recipient still receives something and the malformed content is
/// never echoed.
#[must_use]
pub fn render(letter: &Letter, base_url: &str) -> RenderedMail {
    if !letter.is_encrypted {
        return RenderedMail {
            subject: SUBJECT.to_string(),
            text: letter.content.clone(),
            html: Some(plaintext_html(&letter.content)),
        };
    }

    match Envelope::parse(&letter.content) {
        Ok(envelope) => encrypted_mail(&envelope, base_url),
        Err(e) => {
            warn!(letter = %letter.id, "sealed letter could not be decoded: {e}");
            RenderedMail {
                subject: SUBJECT.to_string(),
                text: UNREADABLE_TEXT.to_string(),
                html: None,
            }
        }
    }
}

/// HTML wrapper for a plaintext letter.
fn plaintext_html(content: &str) -> String {
    format!(
        concat!(
            r#"<div style="font-family: sans-serif; padding: 20px;">"#,
            "<h2>A letter from the past</h2>",
            r#"<div style="white-space: pre-wrap; line-height: 1.6;">{content}</div>"#,
            r#"<hr style="margin-top: 30px; border: none; border-top: 1px solid #eee;">"#,
            r#"<p style="color: #666; font-size: 12px;">"#,
            "You wrote this letter to yourself some time ago. Its moment has arrived.",
            "</p></div>"
        ),
        content = escape_html(content)
    )
}

/// Bodies for a well-formed sealed letter.
fn encrypted_mail(envelope: &Envelope, base_url: &str) -> RenderedMail {
    let url = envelope.capability_url(base_url);
    let enc = &envelope.encrypted;
    let iterations = enc.iterations_or_default();

    let mut text = String::new();
    let _ = writeln!(
        text,
        "This letter was sealed with a passphrase before it was stored; only you can open it."
    );
    let _ = writeln!(text);
    let _ = writeln!(text, "Open the link below and enter your passphrase:");
    let _ = writeln!(text);
    let _ = writeln!(text, "{url}");
    let _ = writeln!(text);
    let _ = writeln!(
        text,
        "If the link does not work, any {ALGORITHM} tool can decrypt the letter with these \
         parameters and your passphrase:"
    );
    let _ = writeln!(text);
    let _ = writeln!(text, "Ciphertext: {}", enc.ciphertext);
    let _ = writeln!(text, "IV: {}", enc.iv);
    let _ = writeln!(text, "Salt: {}", enc.salt);
    let _ = writeln!(text, "Iterations: {iterations}");
    let _ = write!(text, "Key derivation: {KDF} ({KDF_HASH})");

    let html = format!(
        concat!(
            r#"<div style="font-family: sans-serif; padding: 20px;">"#,
            "<h2>A letter from the past</h2>",
            "<p>This letter was sealed with a passphrase before it was stored; ",
            "only you can open it.</p>",
            r#"<p><a href="{url}">Open your letter</a> and enter your passphrase.</p>"#,
            r#"<p style="color: #666; font-size: 12px;">"#,
            "Manual decryption parameters ({algorithm}, key derived via {kdf} {hash}, ",
            "{iterations} iterations):<br>",
            "Ciphertext: {ciphertext}<br>IV: {iv}<br>Salt: {salt}",
            "</p></div>"
        ),
        url = escape_html(&url),
        algorithm = ALGORITHM,
        kdf = KDF,
        hash = KDF_HASH,
        iterations = iterations,
        ciphertext = escape_html(&enc.ciphertext),
        iv = escape_html(&enc.iv),
        salt = escape_html(&enc.salt),
    );

    RenderedMail {
        subject: SUBJECT.to_string(),
        text,
        html: Some(html),
    }
}

/// Minimal HTML escaping for letter content interpolated into the wrapper.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
