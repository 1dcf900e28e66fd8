//! RawMessage → ParsedEmail: the strict, one-shot transform at the inbox
//! boundary, plus the idempotency key derived from it.

use chrono::{DateTime, Utc};
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;

/// Opaque payload from the mail provider adapter. Immutable.
///
/// `received_ts` is the provider's internal date, milliseconds since the
/// epoch (Gmail's `internalDate` convention); `headers` carries whatever
/// the adapter returned verbatim.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawMessage {
    pub message_id: String,
    pub thread_id: String,
    pub received_ts_ms: i64,
    pub headers: HashMap<String, String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub has_attachment_extensions: Vec<String>,
}

/// A required header or body was missing; the message is dropped from the
/// batch and reported with its `message_id` rather than substituted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error for message {message_id}: {reason}")]
pub struct ParseError {
    pub message_id: String,
    pub reason: String,
}

/// Strict, validated transform of a [`RawMessage`]. Every field here is
/// guaranteed present; a message that doesn't satisfy that is never turned
/// into a `ParsedEmail` — see [`ParsedEmail::parse`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ParsedEmail {
    pub message_id: String,
    pub thread_id: String,
    pub received_ts: DateTime<Utc>,
    pub subject: String,
    pub from_address: String,
    pub to_address: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub has_attachment_extensions: Vec<String>,
}

impl ParsedEmail {
    /// Strictly parse a raw message. A message missing `Subject`, `From`,
    /// `To`, or both bodies fails parsing and is reported, never
    /// substituted with a placeholder.
    pub fn parse(raw: &RawMessage) -> Result<Self, ParseError> {
        let err = |reason: &str| ParseError {
            message_id: raw.message_id.clone(),
            reason: reason.to_string(),
        };

        let subject = raw
            .headers
            .get("Subject")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| err("missing Subject header"))?
            .clone();
        let from_address = raw
            .headers
            .get("From")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| err("missing From header"))?
            .clone();
        let to_address = raw
            .headers
            .get("To")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| err("missing To header"))?
            .clone();

        if raw.body_text.is_none() && raw.body_html.is_none() {
            return Err(err("missing body_text and body_html"));
        }

        let received_ts = DateTime::<Utc>::from_timestamp_millis(raw.received_ts_ms)
            .ok_or_else(|| err("invalid received_ts"))?;

        Ok(ParsedEmail {
            message_id: raw.message_id.clone(),
            thread_id: raw.thread_id.clone(),
            received_ts,
            subject,
            from_address,
            to_address,
            body_text: raw.body_text.clone(),
            body_html: raw.body_html.clone(),
            has_attachment_extensions: raw.has_attachment_extensions.clone(),
        })
    }

    /// Best-effort plain-text snippet used by rules/LLM/entity extraction,
    /// preferring `body_text` and falling back to a naive HTML strip.
    pub fn snippet(&self, max_chars: usize) -> String {
        let text = match (&self.body_text, &self.body_html) {
            (Some(t), _) => t.clone(),
            (None, Some(html)) => strip_html_tags(html),
            (None, None) => String::new(),
        };
        text.chars().take(max_chars).collect()
    }
}

fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Stable digest of `(message_id, received_ts, body)` used to drop
/// duplicates within a batch. Durable cross-batch dedup is explicitly
/// deferred to external storage (spec.md §9, open question).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn derive(email: &ParsedEmail) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(email.message_id.as_bytes());
        hasher.update(email.received_ts.timestamp_millis().to_be_bytes());
        hasher.update(email.body_text.as_deref().unwrap_or("").as_bytes());
        hasher.update(email.body_html.as_deref().unwrap_or("").as_bytes());
        IdempotencyKey(hex::encode(hasher.finalize()))
    }
}
