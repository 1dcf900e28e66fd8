//! User-learned patterns (C5), few-shot curation patterns (C8), and the
//! append-only correction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    SenderExact,
    SubjectContains,
    Keyword,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::SenderExact => "sender_exact",
            PatternType::SubjectContains => "subject_contains",
            PatternType::Keyword => "keyword",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "sender_exact" => PatternType::SenderExact,
            "subject_contains" => PatternType::SubjectContains,
            "keyword" => PatternType::Keyword,
            _ => return None,
        })
    }
}

/// A user-specific pattern seen but not yet confirmed enough times to be
/// promoted. Promoted to [`ActiveRule`] once `seen_count >= 2`; never
/// created for `category = "uncategorized"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRule {
    pub user_id: String,
    pub pattern_type: PatternType,
    pub pattern: String,
    pub category: String,
    pub seen_count: u32,
    pub last_seen: DateTime<Utc>,
}

/// A confirmed, user-specific classification pattern. Unique on
/// `(user_id, pattern_type, pattern, category)`. User corrections insert
/// directly at confidence 95; promoted learned rules at 85.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRule {
    pub id: i64,
    pub user_id: String,
    pub pattern_type: PatternType,
    pub pattern: String,
    pub category: String,
    pub confidence: u8,
    pub use_count: u32,
}

/// Full multi-axis classification output associated with a repeatedly
/// confirmed pattern, used to build the LLM's few-shot examples (C6/C8).
/// Distinct from [`ActiveRule`], which only stores a final category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub pattern_type: PatternType,
    pub pattern_value: String,
    pub classification_json: String,
    pub support_count: u32,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Append-only record of a user disagreeing with a classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: i64,
    pub user_id: String,
    pub email_id: String,
    pub from_field: String,
    pub subject: String,
    pub snippet: String,
    pub predicted_labels: Vec<String>,
    pub actual_labels: Vec<String>,
    pub predicted_type: String,
    pub actual_type: String,
    pub timestamp: DateTime<Utc>,
}

/// The four folder-style buckets shown to the user, a closed function of
/// `(type, attention)` (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientLabel {
    Receipts,
    Messages,
    ActionRequired,
    EverythingElse,
}

impl ClientLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientLabel::Receipts => "receipts",
            ClientLabel::Messages => "messages",
            ClientLabel::ActionRequired => "action-required",
            ClientLabel::EverythingElse => "everything-else",
        }
    }
}
