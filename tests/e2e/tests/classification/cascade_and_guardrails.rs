//! Classification cascade precedence (C4/C5/C6/C7) and guardrail
//! precedence (§9) exercised directly against `Cascade` and
//! `GuardrailMatcher`, without going through the full pipeline.

use std::sync::Arc;

use inboxsynth_core::adapters::CannedLlmAdapter;
use inboxsynth_core::classification::cascade::Cascade;
use inboxsynth_core::classification::llm::LlmClassifier;
use inboxsynth_core::classification::rules::{PromotionOutcome, RulesEngine};
use inboxsynth_core::classification::type_mapper::TypeMapper;
use inboxsynth_core::guardrails::{GuardrailCategory, GuardrailMatcher};
use inboxsynth_core::model::{Decider, ImportanceLevel, MailType, PatternType};
use inboxsynth_core::telemetry::CountingSink;
use inboxsynth_core::{Config, Pool};

fn llm(response: &str) -> LlmClassifier<CannedLlmAdapter> {
    LlmClassifier::new(
        CannedLlmAdapter { response: response.to_string() },
        Config::default(),
        Arc::new(CountingSink::default()),
    )
}

/// The type mapper is checked before the rules engine: a user rule for
/// the same sender never even gets a chance to run once C4 matches.
#[test]
fn type_mapper_short_circuits_before_the_rules_engine_is_consulted() {
    let pool = Pool::open_in_memory().unwrap();
    let rules = RulesEngine::new(&pool);
    rules
        .insert_correction_rule(
            "user-1",
            PatternType::SenderExact,
            "calendar-notification@google.com",
            "message",
        )
        .unwrap();

    let response = r#"{
        "mail_type": "message", "type_conf": 0.4,
        "importance": "routine", "importance_conf": 0.5,
        "attention": "none", "attention_conf": 0.5,
        "relationship": "from_unknown", "relationship_conf": 0.5,
        "reason": "stub"
    }"#;
    let cascade = Cascade::new(&pool, TypeMapper::load(None), llm(response));
    let result = cascade
        .classify(
            "user-1",
            "calendar-notification@google.com",
            "Notification: Standup @ Wed Nov 13, 9am - 9:30am (EST)",
            "You have a calendar event",
            false,
            "",
        )
        .unwrap();

    // The type mapper's "event" wins even though the user has a
    // (lower-precedence) rule mapping this exact sender to "message".
    assert_eq!(result.mail_type, MailType::Event);
    assert_eq!(result.decider, Decider::TypeMapper);
}

/// With no type-mapper hit, a matching user rule wins over the LLM's own
/// type, though the LLM's attention/relationship axes are untouched by
/// either deterministic stage.
#[test]
fn rules_engine_wins_over_the_llm_when_type_mapper_is_silent() {
    let pool = Pool::open_in_memory().unwrap();
    let rules = RulesEngine::new(&pool);
    rules
        .insert_correction_rule("user-1", PatternType::SenderExact, "ceo@mycompany.example.com", "message")
        .unwrap();

    let response = r#"{
        "mail_type": "notification", "type_conf": 0.8,
        "importance": "routine", "importance_conf": 0.6,
        "attention": "action_required", "attention_conf": 0.8,
        "relationship": "from_business", "relationship_conf": 0.8,
        "reason": "stub"
    }"#;
    let cascade = Cascade::new(&pool, TypeMapper::load(None), llm(response));
    let result = cascade
        .classify(
            "user-1",
            "ceo@mycompany.example.com",
            "Quick favor",
            "Can you send me the deck before 5?",
            false,
            "",
        )
        .unwrap();

    assert_eq!(result.mail_type, MailType::Message);
    assert_eq!(result.decider, Decider::Rule);
    assert_eq!(result.attention, inboxsynth_core::model::Attention::ActionRequired);
}

/// A second sighting of the same (sender, category) pair promotes a
/// pending rule into an active one that the cascade then prefers over
/// the LLM on a subsequent call for the same sender.
#[test]
fn a_learned_rule_promotes_and_is_preferred_over_the_llm_afterward() {
    let pool = Pool::open_in_memory().unwrap();
    let rules = RulesEngine::new(&pool);
    assert!(matches!(
        rules
            .record_sighting("user-1", PatternType::SenderExact, "noreply@service.example.com", "notification")
            .unwrap(),
        PromotionOutcome::StillPending { seen_count: 1 }
    ));
    assert!(matches!(
        rules
            .record_sighting("user-1", PatternType::SenderExact, "noreply@service.example.com", "notification")
            .unwrap(),
        PromotionOutcome::Promoted(_)
    ));

    let response = r#"{
        "mail_type": "message", "type_conf": 0.5,
        "importance": "routine", "importance_conf": 0.5,
        "attention": "none", "attention_conf": 0.5,
        "relationship": "from_unknown", "relationship_conf": 0.5,
        "reason": "stub"
    }"#;
    let cascade = Cascade::new(&pool, TypeMapper::load(None), llm(response));
    let result = cascade
        .classify(
            "user-1",
            "noreply@service.example.com",
            "Service update",
            "We rolled out a small change",
            false,
            "",
        )
        .unwrap();
    assert_eq!(result.mail_type, MailType::Notification);
    assert_eq!(result.decider, Decider::Rule);
}

/// Guardrail precedence: a message that would match both `never_surface`
/// and `force_critical` patterns resolves to `never_surface`, not the
/// lower-precedence category, regardless of pattern specificity.
#[test]
fn never_surface_beats_force_critical_even_when_both_match() {
    let matcher = GuardrailMatcher::load(None);
    let decision = matcher.resolve(
        "security@examplebank.com",
        "Your one-time verification code",
        "Fraud alert: we detected a suspicious login and generated a one-time passcode for you to confirm it was you.",
    );
    assert_eq!(decision.category, Some(GuardrailCategory::NeverSurface));
    assert!(decision.hide_in_digest);
    assert_eq!(decision.forced_importance, Some(ImportanceLevel::Routine));
}

/// `force_non_critical` only fires when nothing higher in the
/// precedence chain matched; an email with calendar-accepted phrasing
/// but no fraud/OTP language is downgraded cleanly.
#[test]
fn force_non_critical_applies_only_when_nothing_else_matched() {
    let matcher = GuardrailMatcher::load(None);
    let decision = matcher.resolve(
        "calendar-notification@google.com",
        "Declined: Team Sync",
        "Jane has declined this event",
    );
    assert_eq!(decision.category, Some(GuardrailCategory::ForceNonCritical));
    assert_eq!(decision.forced_importance, Some(ImportanceLevel::Routine));
    assert!(!decision.hide_in_digest);
}
