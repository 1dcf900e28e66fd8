//! Core data model: raw/parsed emails, idempotency keys, classification
//! contracts, entities, rules, corrections, and the digest shape.
//!
//! See [`crate::model::email`] for the RawMessage → ParsedEmail transform,
//! [`crate::model::classification`] for the Classification contract (C3),
//! [`crate::model::entity`] for extracted entities (C9) and temporal
//! annotations (C10), [`crate::model::rule`] for learned patterns (C5/C8),
//! and [`crate::model::digest`] for the synthesized timeline (C11).

mod classification;
mod digest;
mod email;
mod entity;
mod rule;

pub use classification::{
    Attention, Classification, Decider, ImportanceLevel, MailType, ModelVersion, ProposeRule,
    Relationship, ValidationError,
};
pub use digest::{Digest, DigestItem, Section};
pub use email::{IdempotencyKey, ParseError, ParsedEmail, RawMessage};
pub use entity::{
    DeadlineData, DecayReason, Entity, EntityCommon, EntityKind, EventData, FlightData,
    NotificationCategory, NotificationData, PromoData, ReminderData, ShipStatus,
    TemporalAnnotation,
};
pub use rule::{ActiveRule, ClientLabel, Correction, LearnedPattern, PatternType, PendingRule};
