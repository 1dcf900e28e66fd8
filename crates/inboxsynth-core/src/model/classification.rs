//! The Classification contract (C3): the single-point decision record
//! every classifier (type mapper, rules engine, LLM) emits in the same
//! shape, with mandatory version metadata for replay/rollback.

use serde::{Deserialize, Serialize};

/// Closed set of message types. `Uncategorized` is the only type the
/// rules engine may never learn (spec.md §3, PendingRule invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailType {
    Otp,
    Notification,
    Receipt,
    Event,
    Promotion,
    Newsletter,
    Message,
    Uncategorized,
}

impl MailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailType::Otp => "otp",
            MailType::Notification => "notification",
            MailType::Receipt => "receipt",
            MailType::Event => "event",
            MailType::Promotion => "promotion",
            MailType::Newsletter => "newsletter",
            MailType::Message => "message",
            MailType::Uncategorized => "uncategorized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "otp" => MailType::Otp,
            "notification" => MailType::Notification,
            "receipt" => MailType::Receipt,
            "event" => MailType::Event,
            "promotion" => MailType::Promotion,
            "newsletter" => MailType::Newsletter,
            "message" => MailType::Message,
            "uncategorized" => MailType::Uncategorized,
            _ => return None,
        })
    }
}

/// Stored importance, prior to temporal decay (C10 produces the resolved
/// value separately — see [`crate::model::TemporalAnnotation`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceLevel {
    Critical,
    TimeSensitive,
    Routine,
}

impl ImportanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceLevel::Critical => "critical",
            ImportanceLevel::TimeSensitive => "time_sensitive",
            ImportanceLevel::Routine => "routine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "critical" => ImportanceLevel::Critical,
            "time_sensitive" => ImportanceLevel::TimeSensitive,
            "routine" => ImportanceLevel::Routine,
            _ => return None,
        })
    }

    /// Base priority weight used by the synthesizer (C11 §4.11).
    pub fn base_priority(&self) -> f64 {
        match self {
            ImportanceLevel::Critical => 1.0,
            ImportanceLevel::TimeSensitive => 0.7,
            ImportanceLevel::Routine => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attention {
    None,
    ActionRequired,
}

impl Attention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attention::None => "none",
            Attention::ActionRequired => "action_required",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "none" => Attention::None,
            "action_required" => Attention::ActionRequired,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    FromKnownPerson,
    FromBusiness,
    FromUnknown,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::FromKnownPerson => "from_known_person",
            Relationship::FromBusiness => "from_business",
            Relationship::FromUnknown => "from_unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "from_known_person" => Relationship::FromKnownPerson,
            "from_business" => Relationship::FromBusiness,
            "from_unknown" => Relationship::FromUnknown,
            _ => return None,
        })
    }
}

/// The component that produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decider {
    TypeMapper,
    Rule,
    Gemini,
    GeminiFallback,
    Fallback,
}

impl Decider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decider::TypeMapper => "type_mapper",
            Decider::Rule => "rule",
            Decider::Gemini => "gemini",
            Decider::GeminiFallback => "gemini_fallback",
            Decider::Fallback => "fallback",
        }
    }
}

/// Whether the cascade should submit a learning event to the rules engine
/// (C5) for this classification, and under what category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRule {
    pub should_propose: bool,
    pub category: Option<String>,
}

impl ProposeRule {
    pub fn none() -> Self {
        ProposeRule {
            should_propose: false,
            category: None,
        }
    }
}

/// Version metadata mandatory on every write. Missing any of these three
/// fields is a hard validation error (spec.md §4.3): it guarantees every
/// historical decision is replayable and rollback-attributable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub model_name: String,
    pub model_version: String,
    pub prompt_version: String,
}

/// The single-point classification decision (spec.md §3 / §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub mail_type: MailType,
    pub type_conf: f64,
    pub importance: ImportanceLevel,
    pub importance_conf: f64,
    pub attention: Attention,
    pub attention_conf: f64,
    pub relationship: Relationship,
    pub relationship_conf: f64,
    pub decider: Decider,
    pub reason: String,
    pub propose_rule: ProposeRule,
    pub version: ModelVersion,
    pub normalized_input_digest: Option<String>,
}

/// Errors rejecting a classification before it is persisted or acted on.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("confidence {0} for {1} is outside [0,1]")]
    ConfidenceOutOfRange(String, String),
    #[error("missing version metadata: {0}")]
    MissingVersion(&'static str),
    #[error("unknown enum value for {field}: {value}")]
    UnknownEnum { field: &'static str, value: String },
}

impl Classification {
    /// Validate confidences, enums (already closed by type, but callers
    /// assembling from untrusted strings should use the `parse` helpers
    /// above and surface [`ValidationError::UnknownEnum`] themselves),
    /// and the mandatory version triple.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, conf) in [
            ("type_conf", self.type_conf),
            ("importance_conf", self.importance_conf),
            ("attention_conf", self.attention_conf),
            ("relationship_conf", self.relationship_conf),
        ] {
            if !(0.0..=1.0).contains(&conf) {
                return Err(ValidationError::ConfidenceOutOfRange(
                    name.to_string(),
                    conf.to_string(),
                ));
            }
        }
        if self.version.model_name.trim().is_empty() {
            return Err(ValidationError::MissingVersion("model_name"));
        }
        if self.version.model_version.trim().is_empty() {
            return Err(ValidationError::MissingVersion("model_version"));
        }
        if self.version.prompt_version.trim().is_empty() {
            return Err(ValidationError::MissingVersion("prompt_version"));
        }
        Ok(())
    }
}
