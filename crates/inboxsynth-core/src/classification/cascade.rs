//! Orchestrates C4 → C5 → C6 (C7): any match short-circuits `type`, but
//! the LLM is still consulted for domains/attention when the type mapper
//! matched. Computes the client label, writes the confidence log, and
//! submits learning events back to C5.

use chrono::Utc;

use crate::adapters::LlmAdapter;
use crate::classification::llm::LlmClassifier;
use crate::classification::rules::RulesEngine;
use crate::classification::type_mapper::TypeMapper;
use crate::model::{
    Attention, Classification, ClientLabel, Decider, MailType, ModelVersion, PatternType,
    ProposeRule,
};
use crate::storage::{Pool, StorageError};

/// Learning events are only ever submitted for Gemini-decided
/// classifications at or above this confidence (spec.md §4.7).
pub const LEARNING_MIN_CONFIDENCE: f64 = 0.85;

/// Computes the four-label client bucket from `(type, attention)`. A
/// closed function: the same input always yields the same label.
pub fn client_label(mail_type: MailType, attention: Attention) -> ClientLabel {
    match mail_type {
        MailType::Receipt => ClientLabel::Receipts,
        MailType::Message => ClientLabel::Messages,
        MailType::Otp => ClientLabel::EverythingElse,
        _ if attention == Attention::ActionRequired => ClientLabel::ActionRequired,
        _ => ClientLabel::EverythingElse,
    }
}

pub struct Cascade<'p, A: LlmAdapter> {
    pool: &'p Pool,
    type_mapper: TypeMapper,
    rules: RulesEngine<'p>,
    llm: LlmClassifier<A>,
}

impl<'p, A: LlmAdapter> Cascade<'p, A> {
    pub fn new(pool: &'p Pool, type_mapper: TypeMapper, llm: LlmClassifier<A>) -> Self {
        Cascade {
            pool,
            type_mapper,
            rules: RulesEngine::new(pool),
            llm,
        }
    }

    /// Runs one email through the cascade and returns its classification.
    /// `fewshot` is the prompt block built by the feedback manager (C8).
    pub fn classify(
        &self,
        user_id: &str,
        from: &str,
        subject: &str,
        snippet: &str,
        has_ics_attachment: bool,
        fewshot: &str,
    ) -> Result<Classification, StorageError> {
        // The LLM pass supplies domains/attention/relationship regardless
        // of whether a deterministic type wins (spec.md §4.4, §4.7).
        let mut classification = self.llm.classify(from, subject, snippet, fewshot);

        if let Some(matched) = self
            .type_mapper
            .get_deterministic_type(from, subject, snippet, has_ics_attachment)
        {
            if let Some(mail_type) = MailType::parse(&matched.type_name) {
                classification.mail_type = mail_type;
                classification.type_conf = matched.confidence;
                classification.decider = Decider::TypeMapper;
                classification.reason = matched.matched_rule;
                classification.propose_rule = ProposeRule::none();
            }
        } else if let Some(rule) = self.rules.classify(subject, snippet, from, user_id)? {
            if let Some(mail_type) = MailType::parse(&rule.category) {
                classification.mail_type = mail_type;
            }
            classification.type_conf = rule.confidence as f64 / 100.0;
            classification.decider = Decider::Rule;
            classification.reason = format!("matched user rule #{}", rule.id);
            classification.propose_rule = ProposeRule::none();
        } else if classification.decider == Decider::Gemini
            && classification.type_conf >= LEARNING_MIN_CONFIDENCE
        {
            let label = client_label(classification.mail_type, classification.attention);
            classification.propose_rule = ProposeRule {
                should_propose: true,
                category: Some(label.as_str().to_string()),
            };
        }

        self.write_confidence_log(user_id, subject, &classification)?;

        if classification.propose_rule.should_propose {
            if let Some(category) = classification.propose_rule.category.clone() {
                if category != "uncategorized" {
                    self.rules
                        .record_sighting(user_id, PatternType::SubjectContains, subject, &category)?;
                }
            }
        }

        Ok(classification)
    }

    fn write_confidence_log(
        &self,
        user_id: &str,
        subject: &str,
        c: &Classification,
    ) -> Result<(), StorageError> {
        let message_id = format!("{user_id}:{subject}");
        let client_label = client_label(c.mail_type, c.attention);
        let ModelVersion {
            model_name,
            model_version,
            prompt_version,
        } = c.version.clone();
        let params = rusqlite::params![
            message_id,
            c.mail_type.as_str(),
            c.type_conf,
            c.importance.as_str(),
            c.importance_conf,
            c.attention.as_str(),
            c.attention_conf,
            c.relationship.as_str(),
            c.relationship_conf,
            c.decider.as_str(),
            c.reason,
            model_name,
            model_version,
            prompt_version,
            client_label.as_str(),
            Utc::now().to_rfc3339(),
        ];
        self.pool.transaction(move |tx| {
            tx.execute(
                "INSERT OR IGNORE INTO confidence_logs (
                    message_id, mail_type, type_conf, importance, importance_conf,
                    attention, attention_conf, relationship, relationship_conf,
                    decider, reason, model_name, model_version, prompt_version,
                    client_label, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                params,
            )?;
            Ok(())
        })
    }
}
