//! Extracted structured entities (C9) and their temporal annotations (C10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classification::ImportanceLevel;

/// Common fields every entity variant carries, regardless of kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCommon {
    pub confidence: f64,
    pub source_email_id: String,
    pub source_thread_id: String,
    pub source_subject: String,
    pub source_snippet: String,
    /// Aware instant the entity's temporal data is anchored to (event
    /// start, deadline due time, OTP issue time, etc). `None` for entities
    /// with no temporal signal (e.g. most promos/notifications).
    pub timestamp: Option<DateTime<Utc>>,
    /// Stored importance, preserved for audit even after decay (spec.md
    /// §4.10: "the stored `importance` is always preserved for audit").
    pub importance: ImportanceLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightData {
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,
    pub departure_time: Option<DateTime<Utc>>,
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineData {
    pub due_at: DateTime<Utc>,
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderData {
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoData {
    pub merchant: Option<String>,
    pub offer: Option<String>,
    pub discount_percent: Option<u32>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// spec.md §4.9: fraud_alert, delivery, bill, job_opportunity, claim,
/// reservation, general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    FraudAlert,
    Delivery,
    Bill,
    JobOpportunity,
    Claim,
    Reservation,
    General,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::FraudAlert => "fraud_alert",
            NotificationCategory::Delivery => "delivery",
            NotificationCategory::Bill => "bill",
            NotificationCategory::JobOpportunity => "job_opportunity",
            NotificationCategory::Claim => "claim",
            NotificationCategory::Reservation => "reservation",
            NotificationCategory::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipStatus {
    Processing,
    InTransit,
    OutForDelivery,
    Delivered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationData {
    pub category: NotificationCategory,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub ship_status: Option<ShipStatus>,
    pub tracking_number: Option<String>,
}

/// Tagged sum over the seven entity kinds spec.md names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    Flight(FlightData),
    Event(EventData),
    Deadline(DeadlineData),
    Reminder(ReminderData),
    Promo(PromoData),
    Notification(NotificationData),
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Flight(_) => "flight",
            EntityKind::Event(_) => "event",
            EntityKind::Deadline(_) => "deadline",
            EntityKind::Reminder(_) => "reminder",
            EntityKind::Promo(_) => "promo",
            EntityKind::Notification(_) => "notification",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub common: EntityCommon,
    pub kind: EntityKind,
    /// Filled in by the temporal engine (C10); `None` until decay runs.
    pub temporal: Option<TemporalAnnotation>,
}

impl Entity {
    /// The instant used by the temporal engine: explicit event/deadline
    /// start for those kinds, OTP expiry, delivery-relevant timestamp, or
    /// the common timestamp as a last resort.
    pub fn temporal_start(&self) -> Option<DateTime<Utc>> {
        match &self.kind {
            EntityKind::Event(e) => Some(e.start),
            EntityKind::Deadline(d) => Some(d.due_at),
            EntityKind::Flight(f) => f.departure_time,
            EntityKind::Notification(n) => n.otp_expires_at.or(self.common.timestamp),
            _ => self.common.timestamp,
        }
    }

    pub fn temporal_end(&self) -> Option<DateTime<Utc>> {
        match &self.kind {
            EntityKind::Event(e) => e.end,
            _ => None,
        }
    }

    /// Resolved importance if decay has run, else the stored importance.
    pub fn effective_importance(&self) -> ImportanceLevel {
        self.temporal
            .as_ref()
            .map(|t| t.resolved_importance)
            .unwrap_or(self.common.importance)
    }
}

/// Why the temporal engine resolved an entity's importance the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayReason {
    TemporalActive,
    TemporalUpcoming,
    TemporalDistant,
    TemporalExpired,
    NoTemporalData,
}

impl DecayReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecayReason::TemporalActive => "temporal_active",
            DecayReason::TemporalUpcoming => "temporal_upcoming",
            DecayReason::TemporalDistant => "temporal_distant",
            DecayReason::TemporalExpired => "temporal_expired",
            DecayReason::NoTemporalData => "no_temporal_data",
        }
    }
}

/// Output of the temporal engine (C10), attached to an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemporalAnnotation {
    pub resolved_importance: ImportanceLevel,
    pub decay_reason: DecayReason,
    pub hide_in_digest: bool,
}
