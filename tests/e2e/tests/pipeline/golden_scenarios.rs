//! Black-box scenarios straight from spec.md §8 ("Concrete scenarios
//! (seeds)"), run end to end through `PipelineCoordinator::run_batch`
//! against an in-memory database and canned LLM responses.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use inboxsynth_core::adapters::{CannedLlmAdapter, FixtureMailAdapter};
use inboxsynth_core::classification::cascade::Cascade;
use inboxsynth_core::classification::llm::LlmClassifier;
use inboxsynth_core::classification::type_mapper::TypeMapper;
use inboxsynth_core::model::{Decider, MailType, Section};
use inboxsynth_core::pipeline::{NeverCancel, PipelineCoordinator};
use inboxsynth_core::telemetry::TracingSink;
use inboxsynth_core::{Config, Pool};

use inboxsynth_e2e_tests::mocks::fixtures::{EmailFixtureFactory, LlmResponseFixtures};

fn coordinator(pool: &Pool, llm_response: String) -> PipelineCoordinator<'_, CannedLlmAdapter> {
    let telemetry = Arc::new(TracingSink);
    let llm = LlmClassifier::new(
        CannedLlmAdapter { response: llm_response },
        Config::default(),
        telemetry.clone(),
    );
    let cascade = Cascade::new(pool, TypeMapper::load(None), llm);
    PipelineCoordinator::new(pool, cascade, Config::default(), telemetry)
}

/// Scenario 1: a Google Calendar invite, matched by the type mapper on
/// sender domain, imminent at digest time.
#[test]
fn calendar_invite_is_type_mapped_and_imminent_lands_in_today() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0).unwrap();
    let raw = EmailFixtureFactory::calendar_invite("cal-1", received);
    let mail = FixtureMailAdapter::new(vec![raw]);
    let coordinator = coordinator(&pool, LlmResponseFixtures::routine_message());

    // "now" sits inside the event's 2pm-3pm PST window (22:00-23:00 UTC).
    let now = Utc.with_ymd_and_hms(2025, 11, 13, 21, 30, 0).unwrap();
    let digest = coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .unwrap();

    assert_eq!(digest.items.len(), 1);
    assert_eq!(digest.items[0].section, Section::Today);
}

/// Scenario 2: the same invite has already finished by more than an hour
/// — expired and hidden from the digest entirely.
#[test]
fn expired_calendar_invite_is_hidden() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0).unwrap();
    let raw = EmailFixtureFactory::calendar_invite("cal-2", received);
    let mail = FixtureMailAdapter::new(vec![raw]);
    let coordinator = coordinator(&pool, LlmResponseFixtures::routine_message());

    // Event ends 23:00 UTC Nov 13; "now" is the next day.
    let now = Utc.with_ymd_and_hms(2025, 11, 14, 22, 0, 0).unwrap();
    let digest = coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .unwrap();

    assert!(digest.items.is_empty());
}

/// Scenario 3: a utility bill with an amount and a due date is extracted
/// as a Deadline and is featured (not demoted to noise).
#[test]
fn bill_with_due_date_is_extracted_as_a_featured_deadline() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
    let raw = EmailFixtureFactory::bill_due("bill-1", received);
    let mail = FixtureMailAdapter::new(vec![raw]);
    let coordinator = coordinator(&pool, LlmResponseFixtures::routine_message());

    let now = Utc.with_ymd_and_hms(2025, 11, 14, 12, 0, 0).unwrap();
    let digest = coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .unwrap();

    assert_eq!(digest.items.len(), 1);
    assert!(digest.items[0].title.contains("$186.56"));
    assert_eq!(digest.items[0].section, Section::Today);
}

/// Scenario 4: a fraud alert. The LLM marks it critical and the
/// extractor's `fraud_alert` notification category routes it straight to
/// CRITICAL regardless of temporal data.
#[test]
fn fraud_alert_lands_in_critical_section() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap();
    let raw = EmailFixtureFactory::fraud_alert("fraud-1", received);
    let mail = FixtureMailAdapter::new(vec![raw]);
    let coordinator = coordinator(&pool, LlmResponseFixtures::fraud_alert_critical());

    let now = received + chrono::Duration::minutes(5);
    let digest = coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .unwrap();

    assert_eq!(digest.items.len(), 1);
    assert_eq!(digest.items[0].section, Section::Critical);
}

/// Scenario 5: an "URGENT" promotional blast with action_required
/// attention is downgraded by the force_non_critical guardrail rather
/// than surfaced as action-required (spec.md §9, guardrail layer).
#[test]
fn urgent_promo_is_downgraded_by_guardrail() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap();
    let raw = EmailFixtureFactory::urgent_promo("promo-1", received);
    let mail = FixtureMailAdapter::new(vec![raw]);
    let coordinator = coordinator(&pool, LlmResponseFixtures::urgent_promo_action_required());

    let now = received + chrono::Duration::minutes(5);
    let digest = coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .unwrap();

    // Guardrail forces routine importance; the promo extractor still
    // finds a discount ("40% off"), so it lands in WORTH_KNOWING rather
    // than CRITICAL/ACTION-REQUIRED, and its thread is also counted once
    // in the noise summary.
    assert_eq!(digest.items.len(), 1);
    assert_eq!(digest.items[0].section, Section::WorthKnowing);
    assert_eq!(digest.noise_summary.values().sum::<u32>(), 1);
}

/// Scenario 6: a GitHub OTP, classified `critical` by the cascade. The
/// notification extractor only admits text it can categorize (fraud,
/// delivery, bill, job, claim, reservation, or a bare notification
/// type), and an OTP body matches none of those, so no entity is ever
/// extracted for it — it never becomes a featured item regardless of
/// how the cascade scored its importance (spec.md §8: client label
/// `everything-else` for otp).
#[test]
fn otp_with_no_extractable_entity_never_surfaces() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap();
    let raw = EmailFixtureFactory::otp("otp-1", received);
    let mail = FixtureMailAdapter::new(vec![raw]);
    let coordinator = coordinator(&pool, LlmResponseFixtures::otp_critical());

    let now = received + chrono::Duration::minutes(2);
    let digest = coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .unwrap();

    assert!(digest.items.is_empty());
}

/// The type mapper's deterministic type always wins over the LLM's type,
/// but the LLM's domains/attention survive untouched (spec.md §4.4,
/// boundary behavior in §8).
#[test]
fn type_mapper_overrides_type_but_not_attention() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap();
    let raw = EmailFixtureFactory::calendar_invite("cal-3", received);
    let mail = FixtureMailAdapter::new(vec![raw]);

    let llm_response = r#"{
        "mail_type": "message", "type_conf": 0.5,
        "importance": "routine", "importance_conf": 0.6,
        "attention": "action_required", "attention_conf": 0.8,
        "relationship": "from_business", "relationship_conf": 0.8,
        "reason": "llm disagreed with the calendar sender"
    }"#;
    let coordinator = coordinator(&pool, llm_response.to_string());

    // Confirm via the cascade directly, since attention isn't exposed on
    // the rendered digest.
    let telemetry = Arc::new(TracingSink);
    let llm = LlmClassifier::new(
        CannedLlmAdapter { response: llm_response.to_string() },
        Config::default(),
        telemetry.clone(),
    );
    let cascade = Cascade::new(&pool, TypeMapper::load(None), llm);
    let result = cascade
        .classify(
            "user-1",
            "calendar-notification@google.com",
            "Notification: Team Sync @ Wed Nov 13, 2pm - 3pm (PST)",
            "You have a calendar event",
            false,
            "",
        )
        .unwrap();
    assert_eq!(result.mail_type, MailType::Event);
    assert_eq!(result.decider, Decider::TypeMapper);
    assert_eq!(result.attention, inboxsynth_core::model::Attention::ActionRequired);

    // The coordinator run still produces a digest (sanity check that the
    // batch doesn't fail regardless of this cross-check).
    let now = received + chrono::Duration::days(1);
    assert!(coordinator
        .run_batch(&mail, "user-1", 10, now, false, &NeverCancel)
        .is_ok());
}
