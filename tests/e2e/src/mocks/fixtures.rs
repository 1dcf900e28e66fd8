//! Test Data Factory
//!
//! Builds [`RawMessage`]s for the pipeline's fetch boundary and canned
//! JSON LLM responses for [`inboxsynth_core::adapters::CannedLlmAdapter`],
//! covering the concrete scenarios enumerated in spec.md §8.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use inboxsynth_core::model::RawMessage;

fn headers(subject: &str, from: &str, to: &str) -> HashMap<String, String> {
    let mut h = HashMap::new();
    h.insert("Subject".to_string(), subject.to_string());
    h.insert("From".to_string(), from.to_string());
    h.insert("To".to_string(), to.to_string());
    h
}

/// Factory for building realistic `RawMessage` fixtures without repeating
/// header/body plumbing in every test.
pub struct EmailFixtureFactory;

impl EmailFixtureFactory {
    pub fn raw(id: &str, from: &str, subject: &str, body: &str, received_ts: DateTime<Utc>) -> RawMessage {
        RawMessage {
            message_id: id.to_string(),
            thread_id: format!("{id}-thread"),
            received_ts_ms: received_ts.timestamp_millis(),
            headers: headers(subject, from, "me@example.com"),
            body_text: Some(body.to_string()),
            body_html: None,
            has_attachment_extensions: vec![],
        }
    }

    pub fn raw_missing_subject(id: &str, from: &str, body: &str, received_ts: DateTime<Utc>) -> RawMessage {
        let mut h = HashMap::new();
        h.insert("From".to_string(), from.to_string());
        h.insert("To".to_string(), "me@example.com".to_string());
        RawMessage {
            message_id: id.to_string(),
            thread_id: format!("{id}-thread"),
            received_ts_ms: received_ts.timestamp_millis(),
            headers: h,
            body_text: Some(body.to_string()),
            body_html: None,
            has_attachment_extensions: vec![],
        }
    }

    /// Scenario 1 (spec.md §8): a Google Calendar invite, matched by the
    /// type mapper on sender domain.
    pub fn calendar_invite(id: &str, received_ts: DateTime<Utc>) -> RawMessage {
        EmailFixtureFactory::raw(
            id,
            "calendar-notification@google.com",
            "Notification: Team Sync @ Wed Nov 13, 2pm - 3pm (PST)",
            "You have a calendar event. Team Sync is scheduled.",
            received_ts,
        )
    }

    /// Scenario 3: a utility bill with an amount and a due date.
    pub fn bill_due(id: &str, received_ts: DateTime<Utc>) -> RawMessage {
        EmailFixtureFactory::raw(
            id,
            "billing@conedison.com",
            "Your Con Edison bill is ready",
            "Your bill is due Nov 15, amount $186.56. Please pay by the due date to avoid a late fee.",
            received_ts,
        )
    }

    /// Scenario 4: a fraud alert from a bank.
    pub fn fraud_alert(id: &str, received_ts: DateTime<Utc>) -> RawMessage {
        EmailFixtureFactory::raw(
            id,
            "security@bank.com",
            "Unusual sign-in activity detected",
            "We detected a suspicious login from an unrecognized device. Secure your account now.",
            received_ts,
        )
    }

    /// Scenario 5: an "urgent" promotional blast.
    pub fn urgent_promo(id: &str, received_ts: DateTime<Utc>) -> RawMessage {
        EmailFixtureFactory::raw(
            id,
            "deals@retailer.com",
            "URGENT: Holiday Essentials",
            "Everything must go! 40% off holiday essentials, today only.",
            received_ts,
        )
    }

    /// Scenario 6: a GitHub OTP email with an explicit expiry window.
    pub fn otp(id: &str, received_ts: DateTime<Utc>) -> RawMessage {
        EmailFixtureFactory::raw(
            id,
            "noreply@github.com",
            "[GitHub] Your verification code",
            "Your verification code is 482913. It expires in 10 minutes.",
            received_ts,
        )
    }

    /// A plain routine newsletter with no entity to extract; lands in the
    /// noise summary rather than as a featured item.
    pub fn newsletter(id: &str, received_ts: DateTime<Utc>) -> RawMessage {
        EmailFixtureFactory::raw(
            id,
            "digest@newsletter.example.com",
            "This Week in Rust Tooling",
            "Here are this week's top links from across the ecosystem.",
            received_ts,
        )
    }

    /// A batch of `n` distinct, non-colliding routine newsletters, useful
    /// for word-budget and noise-summary size tests.
    pub fn batch_of_newsletters(n: usize, received_ts: DateTime<Utc>) -> Vec<RawMessage> {
        (0..n)
            .map(|i| EmailFixtureFactory::newsletter(&format!("nl-{i}"), received_ts))
            .collect()
    }
}

/// Canned LLM JSON responses matching the Classification contract,
/// keyed by the scenarios in spec.md §8. `decider` is always `gemini`
/// here: whether it is actually used depends on whether the type mapper
/// short-circuits first.
pub struct LlmResponseFixtures;

impl LlmResponseFixtures {
    pub fn routine_message() -> String {
        r#"{
            "mail_type": "message", "type_conf": 0.6,
            "importance": "routine", "importance_conf": 0.6,
            "attention": "none", "attention_conf": 0.6,
            "relationship": "from_unknown", "relationship_conf": 0.6,
            "reason": "default routine message"
        }"#
        .to_string()
    }

    pub fn fraud_alert_critical() -> String {
        r#"{
            "mail_type": "notification", "type_conf": 0.97,
            "importance": "critical", "importance_conf": 0.95,
            "attention": "action_required", "attention_conf": 0.9,
            "relationship": "from_business", "relationship_conf": 0.95,
            "reason": "fraud alert language detected"
        }"#
        .to_string()
    }

    pub fn urgent_promo_action_required() -> String {
        r#"{
            "mail_type": "promotion", "type_conf": 0.9,
            "importance": "time_sensitive", "importance_conf": 0.7,
            "attention": "action_required", "attention_conf": 0.8,
            "relationship": "from_business", "relationship_conf": 0.9,
            "reason": "urgent language in promotional subject"
        }"#
        .to_string()
    }

    pub fn otp_critical() -> String {
        r#"{
            "mail_type": "otp", "type_conf": 0.98,
            "importance": "critical", "importance_conf": 0.9,
            "attention": "none", "attention_conf": 0.8,
            "relationship": "from_business", "relationship_conf": 0.9,
            "reason": "one-time code with short expiry"
        }"#
        .to_string()
    }

    pub fn malformed_then_repairable() -> String {
        // Missing comma between "type_conf": 0.6 and the next key, and a
        // trailing comma before the closing brace: exercises the JSON
        // repair cascade (spec.md §4.6 step 3).
        r#"{
            "mail_type": "message" "type_conf": 0.6,
            "importance": "routine", "importance_conf": 0.6,
            "attention": "none", "attention_conf": 0.6,
            "relationship": "from_unknown", "relationship_conf": 0.6,
            "reason": "malformed but repairable",
        }"#
        .to_string()
    }

    pub fn unrepairable_garbage() -> String {
        "not json at all, just prose from a model that ignored the instructions".to_string()
    }
}
