//! Encrypted-content envelope codec.
//!
//! When a letter is sealed in the browser, its stored content is a small
//! versioned JSON document carrying the ciphertext and the public key-
//! derivation parameters. Nothing in it is secret; decryption requires the
//! passphrase, which never reaches the server. This module only decodes
//! envelopes and renders capability links. Encryption and decryption happen
//! in the sender's and recipient's browsers.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cipher identifier carried in every envelope.
pub const ALGORITHM: &str = "AES-GCM";

/// Key-derivation function identifier carried in every envelope.
pub const KDF: &str = "PBKDF2";

/// Hash used by the key-derivation function.
pub const KDF_HASH: &str = "SHA-256";

/// KDF iteration count assumed when an envelope omits one.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Characters escaped in capability-link query components.
///
/// The unreserved set of RFC 3986; everything else (notably the `+`, `/`,
/// and `=` of Base64) is percent-encoded.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors from parsing an envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The content is not the envelope JSON shape.
    #[error("Envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope carries a version this build does not understand.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u32),
}

/// The encrypted payload and its public key-derivation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContent {
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Base64 AES-GCM initialization vector.
    pub iv: String,
    /// Base64 PBKDF2 salt.
    pub salt: String,
    /// Cipher identifier (always [`ALGORITHM`] for well-formed envelopes).
    pub algorithm: String,
    /// KDF identifier (always [`KDF`] for well-formed envelopes).
    pub kdf: String,
    /// KDF iteration count; older envelopes omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
}

impl EncryptedContent {
    /// Iteration count to use for key derivation.
    #[must_use]
    pub const fn iterations_or_default(&self) -> u32 {
        match self.iterations {
            Some(n) => n,
            None => DEFAULT_KDF_ITERATIONS,
        }
    }
}

/// The versioned wire shape of a sealed letter's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire format version; see [`Envelope::VERSION`].
    pub version: u32,
    /// The encrypted payload.
    pub encrypted: EncryptedContent,
}

impl Envelope {
    /// The envelope version this build reads and writes.
    pub const VERSION: u32 = 1;

    /// Strictly parse stored content as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the content is not envelope JSON or the
    /// version tag is unknown. Content flagged as encrypted must parse;
    /// there is no plaintext fallthrough on this path.
    pub fn parse(content: &str) -> Result<Self, DecodeError> {
        let envelope: Self = serde_json::from_str(content)?;
        if envelope.version != Self::VERSION {
            return Err(DecodeError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope)
    }

    /// Serialize the envelope to its stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, DecodeError> {
        serde_json::to_string(self).map_err(DecodeError::Json)
    }

    /// Render the capability link for this envelope.
    ///
    /// The link carries every non-secret decryption parameter; anyone
    /// holding both the link and the passphrase can read the letter.
    #[must_use]
    pub fn capability_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        format!(
            "{base}/decrypt?c={}&i={}&s={}&iter={}",
            utf8_percent_encode(&self.encrypted.ciphertext, QUERY_COMPONENT),
            utf8_percent_encode(&self.encrypted.iv, QUERY_COMPONENT),
            utf8_percent_encode(&self.encrypted.salt, QUERY_COMPONENT),
            self.encrypted.iterations_or_default(),
        )
    }
}

/// What a letter's stored content turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedContent {
    /// A well-formed envelope.
    Encrypted(Envelope),
    /// Anything else; treated as an opaque plaintext letter.
    Plaintext,
}

/// Classify stored content as an envelope or plaintext.
///
/// This is the lenient path for content of unknown provenance. Letters
/// flagged as encrypted go through [`Envelope::parse`] instead, so that a
/// malformed envelope surfaces as an error rather than being mailed out as
/// a readable letter.
#[must_use]
pub fn decode(content: &str) -> DecodedContent {
    match Envelope::parse(content) {
        Ok(envelope) => DecodedContent::Encrypted(envelope),
        Err(_) => DecodedContent::Plaintext,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use proptest::prelude::*;

    fn sample_envelope() -> Envelope {
        Envelope {
            version: 1,
            encrypted: EncryptedContent {
                ciphertext: STANDARD.encode(b"the letter body, sealed"),
                iv: STANDARD.encode([0x01; 12]),
                salt: STANDARD.encode([0x02; 16]),
                algorithm: ALGORITHM.to_string(),
                kdf: KDF.to_string(),
                iterations: Some(100_000),
            },
        }
    }

    #[test]
    fn test_parse_well_formed_envelope() {
        let json = sample_envelope().to_json().unwrap();
        let parsed = Envelope::parse(&json).unwrap();
        assert_eq!(parsed, sample_envelope());
    }

    #[test]
    fn test_parse_rejects_plaintext() {
        assert!(matches!(
            Envelope::parse("Dear future me, hello"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            Envelope::parse(r#"{"version":1}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let mut envelope = sample_envelope();
        envelope.version = 2;
        let json = envelope.to_json().unwrap();
        assert!(matches!(
            Envelope::parse(&json),
            Err(DecodeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_parse_accepts_missing_iterations() {
        let json = r#"{"version":1,"encrypted":{"ciphertext":"YQ==","iv":"Yg==","salt":"Yw==","algorithm":"AES-GCM","kdf":"PBKDF2"}}"#;
        let parsed = Envelope::parse(json).unwrap();
        assert_eq!(parsed.encrypted.iterations, None);
        assert_eq!(
            parsed.encrypted.iterations_or_default(),
            DEFAULT_KDF_ITERATIONS
        );
    }

    #[test]
    fn test_decode_classifies_content() {
        let json = sample_envelope().to_json().unwrap();
        assert!(matches!(decode(&json), DecodedContent::Encrypted(_)));
        assert_eq!(decode("just a letter"), DecodedContent::Plaintext);
        assert_eq!(decode(r#"{"other":"json"}"#), DecodedContent::Plaintext);
    }

    #[test]
    fn test_capability_url_escapes_base64() {
        let envelope = Envelope {
            version: 1,
            encrypted: EncryptedContent {
                ciphertext: "ab+/cd==".to_string(),
                iv: "iv==".to_string(),
                salt: "s/lt".to_string(),
                algorithm: ALGORITHM.to_string(),
                kdf: KDF.to_string(),
                iterations: None,
            },
        };

        let url = envelope.capability_url("http://localhost:3000");
        assert_eq!(
            url,
            "http://localhost:3000/decrypt?c=ab%2B%2Fcd%3D%3D&i=iv%3D%3D&s=s%2Flt&iter=100000"
        );
    }

    #[test]
    fn test_capability_url_trims_trailing_slash() {
        let url = sample_envelope().capability_url("https://example.com/");
        assert!(url.starts_with("https://example.com/decrypt?c="));
    }

    proptest! {
        /// decode(encode(envelope)) == envelope for any well-formed envelope.
        #[test]
        fn prop_envelope_roundtrip(
            ciphertext in proptest::collection::vec(any::<u8>(), 0..256),
            iv in proptest::collection::vec(any::<u8>(), 12..=12),
            salt in proptest::collection::vec(any::<u8>(), 16..=16),
            iterations in proptest::option::of(1u32..10_000_000),
        ) {
            let envelope = Envelope {
                version: 1,
                encrypted: EncryptedContent {
                    ciphertext: STANDARD.encode(&ciphertext),
                    iv: STANDARD.encode(&iv),
                    salt: STANDARD.encode(&salt),
                    algorithm: ALGORITHM.to_string(),
                    kdf: KDF.to_string(),
                    iterations,
                },
            };

            let json = envelope.to_json().unwrap();
            prop_assert_eq!(Envelope::parse(&json).unwrap(), envelope);
        }

        /// Percent-decoding the URL's query values reproduces the envelope
        /// fields exactly.
        #[test]
        fn prop_capability_url_roundtrip(
            ciphertext in proptest::collection::vec(any::<u8>(), 1..128),
        ) {
            let envelope = Envelope {
                version: 1,
                encrypted: EncryptedContent {
                    ciphertext: STANDARD.encode(&ciphertext),
                    iv: STANDARD.encode([7u8; 12]),
                    salt: STANDARD.encode([9u8; 16]),
                    algorithm: ALGORITHM.to_string(),
                    kdf: KDF.to_string(),
                    iterations: Some(250_000),
                },
            };

            let url = envelope.capability_url("http://localhost:3000");
            let query = url.split_once('?').unwrap().1;
            let mut c = None;
            for pair in query.split('&') {
                let (key, value) = pair.split_once('=').unwrap();
                if key == "c" {
                    c = Some(
                        percent_encoding::percent_decode_str(value)
                            .decode_utf8()
                            .unwrap()
                            .into_owned(),
                    );
                }
            }
            prop_assert_eq!(c.unwrap(), envelope.encrypted.ciphertext);
        }
    }
}
