//! Entity extractor (C9): rule-based extractors run in fixed order
//! against each email, the first to produce an entity wins (one entity
//! per email in the MVP — spec.md §4.9). An LLM fallback is defined but
//! optional; this build relies entirely on the rule-based extractors, as
//! the MVP cascade does.

pub mod deadline;
pub mod event;
pub mod flight;
pub mod notification;
pub mod promo;
pub mod reminder;

use std::sync::Arc;

use crate::model::{
    Classification, Entity, EntityCommon, EntityKind, ImportanceLevel, ParsedEmail,
};
use crate::telemetry::{StructuredEvent, TelemetrySink};

pub use deadline::DeadlinePatterns;
pub use event::EventPatterns;
pub use flight::FlightPatterns;
pub use notification::{categorize_notification, NotificationPatterns};
pub use promo::PromoPatterns;
pub use reminder::ReminderPatterns;

const SNIPPET_CHARS: usize = 1000;
const MIN_SUBJECT_LEN: usize = 5;

/// Owns the compiled regex catalogues for all six extractors and runs
/// them in the fixed order spec.md §4.9 names: Flight, Event, Deadline,
/// Reminder, Promo, Notification.
pub struct ExtractorEngine {
    flight: FlightPatterns,
    event: EventPatterns,
    deadline: DeadlinePatterns,
    reminder: ReminderPatterns,
    promo: PromoPatterns,
    notification: NotificationPatterns,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ExtractorEngine {
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        ExtractorEngine {
            flight: FlightPatterns::new(),
            event: EventPatterns::new(),
            deadline: DeadlinePatterns::new(),
            reminder: ReminderPatterns::new(),
            promo: PromoPatterns::new(),
            notification: NotificationPatterns::new(),
            telemetry,
        }
    }

    /// Runs the fixed-order cascade against one classified email. Returns
    /// `None` if nothing matched (the email is either an orphan
    /// time-sensitive email or pure noise, decided later by C11).
    pub fn extract(&self, email: &ParsedEmail, classification: &Classification) -> Option<Entity> {
        let snippet = email.snippet(SNIPPET_CHARS);
        let reference_time = email.received_ts;
        let is_notification_type = classification.mail_type == crate::model::MailType::Notification;

        let (kind, confidence) = if let Some((data, conf)) =
            self.flight.try_extract(&email.subject, &snippet, reference_time)
        {
            (EntityKind::Flight(data), conf)
        } else if let Some((data, conf)) = self.event.try_extract(&email.subject, &snippet, reference_time) {
            (EntityKind::Event(data), conf)
        } else if let Some((data, conf)) = self.deadline.try_extract(&email.subject, &snippet, reference_time) {
            (EntityKind::Deadline(data), conf)
        } else if let Some((data, conf)) = self.reminder.try_extract(&email.subject, &snippet) {
            (EntityKind::Reminder(data), conf)
        } else if let Some((data, conf)) =
            self.promo
                .try_extract(&email.from_address, &email.subject, &snippet, reference_time)
        {
            (EntityKind::Promo(data), conf)
        } else if let Some((data, conf)) = self.notification.try_extract(
            &email.subject,
            &snippet,
            reference_time,
            is_notification_type,
        ) {
            (EntityKind::Notification(data), conf)
        } else {
            return None;
        };

        let entity = Entity {
            common: EntityCommon {
                confidence,
                source_email_id: email.message_id.clone(),
                source_thread_id: email.thread_id.clone(),
                source_subject: email.subject.clone(),
                source_snippet: snippet,
                timestamp: Some(reference_time),
                importance: classification.importance,
            },
            kind,
            temporal: None,
        };

        Some(self.recover_metadata(entity, email))
    }

    /// Recovers missing `source_thread_id`/`source_email_id`/
    /// `source_subject` from the originating email and logs an
    /// `EXTRACT_INCONSISTENT` telemetry event for each recovery (spec.md
    /// §4.9).
    fn recover_metadata(&self, mut entity: Entity, email: &ParsedEmail) -> Entity {
        if entity.common.source_thread_id.trim().is_empty() {
            let recovered = !email.thread_id.trim().is_empty();
            entity.common.source_thread_id = email.thread_id.clone();
            self.telemetry.record(StructuredEvent::ExtractInconsistent {
                email_id: email.message_id.clone(),
                issue: "missing_thread_id",
                recovered,
            });
        }
        if entity.common.source_email_id.trim().is_empty() {
            entity.common.source_email_id = email.message_id.clone();
            self.telemetry.record(StructuredEvent::ExtractInconsistent {
                email_id: email.message_id.clone(),
                issue: "missing_email_id",
                recovered: true,
            });
        }
        if entity.common.source_subject.trim().len() < MIN_SUBJECT_LEN {
            entity.common.source_subject = email.subject.clone();
            self.telemetry.record(StructuredEvent::ExtractInconsistent {
                email_id: email.message_id.clone(),
                issue: "missing_or_short_subject",
                recovered: !email.subject.trim().is_empty(),
            });
        }
        entity
    }
}

/// Stored importance default used when no classification is available
/// (the LLM fallback path, per spec.md §4.9's optional LLM extractor).
pub const DEFAULT_ENTITY_IMPORTANCE: ImportanceLevel = ImportanceLevel::Routine;
