//! Timeline synthesizer (C11): turns classified emails and their
//! extracted entities into a sectioned digest. Featured entities
//! (critical/time-sensitive, not hidden by decay or guardrails) are
//! rendered individually; routine entities with useful extracted detail
//! land in WORTH_KNOWING; everything else is a count in the noise
//! breakdown.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::model::{Classification, DecayReason, Entity, EntityKind, ImportanceLevel, MailType, NotificationCategory, ParsedEmail, ShipStatus};
use crate::model::{Digest, DigestItem, Section};

/// One classified email, paired with its extracted entity (if any). The
/// entity's `temporal` annotation and `common.importance` are expected
/// to already reflect both C10 decay and the guardrail layer by the time
/// this reaches the synthesizer.
pub struct ClassifiedEmail<'a> {
    pub email: &'a ParsedEmail,
    pub classification: &'a Classification,
    pub entity: Option<Entity>,
}

/// `get_friendly_type_name` equivalent: a human-readable label used to
/// group routine/orphaned threads in the noise summary.
pub fn friendly_type_name(mail_type: MailType) -> &'static str {
    match mail_type {
        MailType::Otp => "verification codes",
        MailType::Notification => "notifications",
        MailType::Receipt => "receipts",
        MailType::Event => "events",
        MailType::Promotion => "promotions",
        MailType::Newsletter => "newsletters",
        MailType::Message => "messages",
        MailType::Uncategorized => "uncategorized",
    }
}

/// Adaptive word budget for the digest's summary sentence (spec.md §4.11).
pub fn word_budget(total_emails: usize) -> (u32, u32) {
    if total_emails <= 10 {
        (60, 90)
    } else if total_emails <= 30 {
        (90, 120)
    } else if total_emails <= 100 {
        (120, 150)
    } else {
        (150, 180)
    }
}

fn gmail_thread_link(thread_id: &str) -> String {
    format!("https://mail.google.com/mail/u/0/#all/{thread_id}")
}

fn priority(importance: ImportanceLevel, confidence: f64) -> f64 {
    (importance.base_priority() * confidence * 1000.0).round() / 1000.0
}

fn is_fraud_alert(kind: &EntityKind) -> bool {
    matches!(kind, EntityKind::Notification(n) if n.category == NotificationCategory::FraudAlert)
}

fn is_out_for_delivery(kind: &EntityKind) -> bool {
    matches!(kind, EntityKind::Notification(n) if n.ship_status == Some(ShipStatus::OutForDelivery))
}

/// Hours from `now` until the entity's temporal anchor, if it has one.
/// Negative for anchors already in the past.
fn hours_until(entity: &Entity, now: DateTime<Utc>) -> Option<i64> {
    entity
        .temporal_start()
        .map(|start| (start - now).num_hours())
}

fn summarize(entity: &Entity) -> (String, String) {
    let title = match &entity.kind {
        EntityKind::Flight(f) => f
            .flight_number
            .clone()
            .map(|n| format!("Flight {n}"))
            .unwrap_or_else(|| entity.common.source_subject.clone()),
        EntityKind::Event(_) => entity.common.source_subject.clone(),
        EntityKind::Deadline(d) => match &d.amount {
            Some(amount) => format!("{} ({amount})", entity.common.source_subject),
            None => entity.common.source_subject.clone(),
        },
        EntityKind::Reminder(r) => format!("Reminder: {}", r.action),
        EntityKind::Promo(p) => match (&p.merchant, &p.offer) {
            (Some(m), Some(o)) => format!("{m}: {o}"),
            (Some(m), None) => m.clone(),
            _ => entity.common.source_subject.clone(),
        },
        EntityKind::Notification(n) if n.category == NotificationCategory::FraudAlert => {
            format!("Fraud alert: {}", entity.common.source_subject)
        }
        EntityKind::Notification(_) => entity.common.source_subject.clone(),
    };
    (title, entity.common.source_snippet.clone())
}

/// Fraud alerts and imminent deadlines always sit in CRITICAL (spec.md
/// §4.11 step 5, "fraud_alert / imminent deadline / critical
/// importance"). An imminent *event*, by contrast, still routes by its
/// time window into TODAY — a meeting starting in 20 minutes is urgent
/// but not the same kind of critical as a fraud alert or an about-to-be-
/// missed bill (spec.md §8 scenario 1: resolved_importance=critical,
/// section=TODAY for a same-hour calendar invite). Only entity kinds
/// with no time window at all fall back to stored critical importance.
fn section_for_featured(entity: &Entity, now: DateTime<Utc>) -> Section {
    if is_fraud_alert(&entity.kind) {
        return Section::Critical;
    }
    if is_out_for_delivery(&entity.kind) {
        return Section::Today;
    }
    if matches!(entity.kind, EntityKind::Deadline(_))
        && entity.temporal.map(|t| t.decay_reason) == Some(DecayReason::TemporalActive)
    {
        return Section::Critical;
    }
    match (&entity.kind, hours_until(entity, now)) {
        (EntityKind::Event(_) | EntityKind::Deadline(_), Some(h)) if h <= 24 => Section::Today,
        (EntityKind::Event(_) | EntityKind::Deadline(_), Some(h)) if h <= 168 => Section::ComingUp,
        _ if entity.effective_importance() == ImportanceLevel::Critical => Section::Critical,
        _ => Section::ComingUp,
    }
}

/// Builds the sectioned digest for one batch.
pub struct TimelineSynthesizer;

impl TimelineSynthesizer {
    pub fn new() -> Self {
        TimelineSynthesizer
    }

    pub fn build(&self, emails: &[ClassifiedEmail<'_>], now: DateTime<Utc>) -> Digest {
        let mut items: Vec<DigestItem> = Vec::new();
        let mut noise_breakdown: BTreeMap<String, u32> = BTreeMap::new();
        let mut counted_threads: BTreeSet<&str> = BTreeSet::new();

        for item in emails {
            let thread_id = item.email.thread_id.as_str();
            match &item.entity {
                Some(entity) => {
                    let hidden = entity.temporal.map(|t| t.hide_in_digest).unwrap_or(false);
                    let importance = entity.effective_importance();

                    if hidden {
                        continue;
                    }

                    let section = match importance {
                        ImportanceLevel::Critical | ImportanceLevel::TimeSensitive => {
                            Some(section_for_featured(entity, now))
                        }
                        ImportanceLevel::Routine => None,
                    };

                    match section {
                        Some(section) => {
                            let (title, snippet) = summarize(entity);
                            items.push(DigestItem {
                                section,
                                priority: priority(importance, entity.common.confidence),
                                title,
                                snippet,
                                source_thread_id: thread_id.to_string(),
                                gmail_thread_link: gmail_thread_link(thread_id),
                                timestamp: entity.common.timestamp.unwrap_or(item.email.received_ts),
                                source_email_id: entity.common.source_email_id.clone(),
                            });
                        }
                        None => {
                            let (title, snippet) = summarize(entity);
                            items.push(DigestItem {
                                section: Section::WorthKnowing,
                                priority: priority(ImportanceLevel::Routine, entity.common.confidence),
                                title,
                                snippet,
                                source_thread_id: thread_id.to_string(),
                                gmail_thread_link: gmail_thread_link(thread_id),
                                timestamp: entity.common.timestamp.unwrap_or(item.email.received_ts),
                                source_email_id: entity.common.source_email_id.clone(),
                            });
                            if counted_threads.insert(thread_id) {
                                *noise_breakdown
                                    .entry(friendly_type_name(item.classification.mail_type).to_string())
                                    .or_insert(0) += 1;
                            }
                        }
                    }
                }
                None => {
                    // No entity: either pure routine noise, or an "orphan"
                    // time-sensitive email that failed extraction. Both are
                    // demoted to the noise summary (spec.md §9 glossary:
                    // Orphan time-sensitive).
                    if counted_threads.insert(thread_id) {
                        *noise_breakdown
                            .entry(friendly_type_name(item.classification.mail_type).to_string())
                            .or_insert(0) += 1;
                    }
                }
            }
        }

        // Sort featured items within each section descending by priority,
        // ties broken by (timestamp desc, source_email_id asc) for
        // determinism (spec.md §4.11 step 3).
        items.sort_by(|a, b| {
            a.section
                .cmp(&b.section)
                .then(b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal))
                .then(b.timestamp.cmp(&a.timestamp))
                .then(a.source_email_id.cmp(&b.source_email_id))
        });

        Digest {
            items,
            noise_summary: noise_breakdown,
            generated_ts: now,
        }
    }
}

impl Default for TimelineSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}
