//! Rule promotion and correction learning (C5/C8): sightings promote to
//! rules on the second occurrence, corrections insert a rule directly,
//! and the rules engine's tiered lookup feeds back into the cascade
//! ahead of the LLM on the next classification.

use std::sync::Arc;

use inboxsynth_core::adapters::CannedLlmAdapter;
use inboxsynth_core::classification::cascade::Cascade;
use inboxsynth_core::classification::llm::LlmClassifier;
use inboxsynth_core::classification::rules::{PromotionOutcome, RulesEngine};
use inboxsynth_core::classification::type_mapper::TypeMapper;
use inboxsynth_core::model::{Decider, MailType, PatternType};
use inboxsynth_core::telemetry::CountingSink;
use inboxsynth_core::{Config, FeedbackManager, Pool};

fn routine_llm_response() -> String {
    r#"{
        "mail_type": "message", "type_conf": 0.5,
        "importance": "routine", "importance_conf": 0.6,
        "attention": "none", "attention_conf": 0.6,
        "relationship": "from_unknown", "relationship_conf": 0.6,
        "reason": "default routine"
    }"#
    .to_string()
}

/// A sender seen twice with the same learned category promotes from
/// `pending_rules` into `rules` at confidence 85, and a subsequent
/// cascade run for that sender picks the rule up ahead of the LLM.
#[test]
fn promoted_rule_is_used_by_the_cascade_on_the_next_classification() {
    let pool = Pool::open_in_memory().unwrap();
    let rules = RulesEngine::new(&pool);

    // "statement" avoids colliding with the deterministic type mapper's
    // own receipt patterns ("your receipt", "order confirmation",
    // "payment received", "thank you for your order") so the rule
    // lookup, not C4, is what actually decides this classification.
    let first = rules
        .record_sighting("user-1", PatternType::SubjectContains, "statement", "receipts")
        .unwrap();
    assert!(matches!(first, PromotionOutcome::StillPending { seen_count: 1 }));

    let second = rules
        .record_sighting("user-1", PatternType::SubjectContains, "statement", "receipts")
        .unwrap();
    assert!(matches!(second, PromotionOutcome::Promoted(_)));
    assert!(rules.get_pending_rules("user-1").unwrap().is_empty());

    let telemetry = Arc::new(CountingSink::default());
    let llm = LlmClassifier::new(
        CannedLlmAdapter { response: routine_llm_response() },
        Config::default(),
        telemetry.clone(),
    );
    let cascade = Cascade::new(&pool, TypeMapper::load(None), llm);
    let result = cascade
        .classify(
            "user-1",
            "billing@somestore.example.com",
            "Your monthly statement is ready",
            "here is your account statement",
            false,
            "",
        )
        .unwrap();

    assert_eq!(result.mail_type, MailType::Receipt);
    assert_eq!(result.decider, Decider::Rule);
}

/// A user correction inserts a rule directly at confidence 95, bypassing
/// `pending_rules` entirely, and the rules engine's tiered lookup prefers
/// a sender-exact match over a keyword match for the same category.
#[test]
fn correction_creates_an_immediate_high_confidence_rule() {
    let pool = Pool::open_in_memory().unwrap();
    let feedback = FeedbackManager::new(&pool);

    feedback
        .record_correction(
            "user-1",
            "email-1",
            "alerts@bank.example.com",
            "Your statement is ready",
            "view your statement",
            &["Inboxsynth/Messages".to_string()],
            &["Inboxsynth/Receipts".to_string()],
            "message",
        )
        .unwrap();

    let rules = RulesEngine::new(&pool);
    let matched = rules
        .classify(
            "Your statement is ready",
            "view your statement",
            "alerts@bank.example.com",
            "user-1",
        )
        .unwrap()
        .unwrap();
    assert_eq!(matched.category, "receipt");
    assert_eq!(matched.confidence, 95);

    let stats = feedback.get_correction_stats().unwrap();
    assert_eq!(stats.total_corrections, 1);
}

/// Corrections to `uncategorized` are recorded in the append-only log
/// but never become a learnable pattern or rule (spec.md §4.8).
#[test]
fn uncategorized_correction_is_logged_but_not_learned() {
    let pool = Pool::open_in_memory().unwrap();
    let feedback = FeedbackManager::new(&pool);

    feedback
        .record_correction(
            "user-1",
            "email-1",
            "sender@example.com",
            "subject",
            "snippet",
            &["Inboxsynth/Messages".to_string()],
            &["Inboxsynth/Uncategorized".to_string()],
            "message",
        )
        .unwrap();

    let stats = feedback.get_correction_stats().unwrap();
    assert_eq!(stats.total_corrections, 1);
    assert_eq!(stats.high_confidence_patterns, 0);

    let rules = RulesEngine::new(&pool);
    assert!(rules
        .classify("subject", "snippet", "sender@example.com", "user-1")
        .unwrap()
        .is_none());
}

/// A high-confidence Gemini classification with no rule or type-mapper
/// hit proposes a rule and feeds it into `pending_rules`; repeating the
/// same email's subject a second time promotes it without any further
/// correction being involved.
#[test]
fn high_confidence_gemini_classification_proposes_and_then_promotes_a_rule() {
    let pool = Pool::open_in_memory().unwrap();
    let telemetry = Arc::new(CountingSink::default());
    let confident_response = r#"{
        "mail_type": "promotion", "type_conf": 0.92,
        "importance": "routine", "importance_conf": 0.7,
        "attention": "none", "attention_conf": 0.7,
        "relationship": "from_business", "relationship_conf": 0.7,
        "reason": "looks promotional"
    }"#
    .to_string();

    let llm_one = LlmClassifier::new(
        CannedLlmAdapter { response: confident_response.clone() },
        Config::default(),
        telemetry.clone(),
    );
    let cascade_one = Cascade::new(&pool, TypeMapper::load(None), llm_one);
    let first = cascade_one
        .classify(
            "user-1",
            "deals@retailer.example.com",
            "Weekend flash sale just for you",
            "limited time offer",
            false,
            "",
        )
        .unwrap();
    assert_eq!(first.decider, Decider::Gemini);
    assert!(first.propose_rule.should_propose);

    let rules = RulesEngine::new(&pool);
    assert_eq!(rules.get_pending_rules("user-1").unwrap().len(), 1);

    let llm_two = LlmClassifier::new(
        CannedLlmAdapter { response: confident_response },
        Config::default(),
        telemetry,
    );
    let cascade_two = Cascade::new(&pool, TypeMapper::load(None), llm_two);
    let second = cascade_two
        .classify(
            "user-1",
            "deals@retailer.example.com",
            "Weekend flash sale just for you",
            "limited time offer",
            false,
            "",
        )
        .unwrap();
    assert!(second.propose_rule.should_propose);
    assert!(rules.get_pending_rules("user-1").unwrap().is_empty());
}
