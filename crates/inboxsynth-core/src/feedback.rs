//! Feedback manager (C8): records user corrections as an append-only
//! log, maintains `learned_patterns` with support counts, and exposes
//! few-shot examples and introspection for C6 and the rules engine.

use chrono::Utc;
use serde::Serialize;

use crate::classification::rules::RulesEngine;
use crate::model::{Correction, PatternType};
use crate::storage::{Pool, StorageError};

/// Label-name mapping the client's folder labels back onto internal mail
/// types, mirroring the provider-side label taxonomy (spec.md §9,
/// supplemented from the original label→type mapping).
fn extract_type_from_labels(labels: &[String]) -> Option<String> {
    for label in labels {
        let mapped = match label.as_str() {
            "Inboxsynth/Newsletters" => "newsletter",
            "Inboxsynth/Notifications" => "notification",
            "Inboxsynth/Receipts" => "receipt",
            "Inboxsynth/Events" => "event",
            "Inboxsynth/Promotions" => "promotion",
            "Inboxsynth/Messages" => "message",
            "Inboxsynth/Review-Later" | "Inboxsynth/Uncategorized" => "uncategorized",
            _ => continue,
        };
        return Some(mapped.to_string());
    }
    None
}

#[derive(Debug, Clone, Serialize)]
struct LearnedClassification {
    #[serde(rename = "type")]
    mail_type: String,
}

/// A correction surfaced for the LLM's prompt, curated from
/// `learned_patterns` by support count (spec.md §4.8, "diverse,
/// support-weighted examples").
#[derive(Debug, Clone)]
pub struct FewShotExample {
    pub sender: String,
    pub mail_type: String,
    pub support_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CorrectionStats {
    pub total_corrections: u64,
    pub high_confidence_patterns: u64,
}

pub struct FeedbackManager<'p> {
    pool: &'p Pool,
    rules: RulesEngine<'p>,
}

impl<'p> FeedbackManager<'p> {
    pub fn new(pool: &'p Pool) -> Self {
        FeedbackManager {
            pool,
            rules: RulesEngine::new(pool),
        }
    }

    /// Records a user disagreement and, unless the user's correction was
    /// itself `uncategorized`, learns from it: bumps `learned_patterns`
    /// support and inserts a direct-confidence-95 rule (spec.md §4.5,
    /// §4.8).
    pub fn record_correction(
        &self,
        user_id: &str,
        email_id: &str,
        from_field: &str,
        subject: &str,
        snippet: &str,
        predicted_labels: &[String],
        actual_labels: &[String],
        predicted_type: &str,
    ) -> Result<i64, StorageError> {
        let actual_type = extract_type_from_labels(actual_labels).unwrap_or_else(|| "uncategorized".to_string());
        let now = Utc::now();

        let correction_id = {
            let user_id = user_id.to_string();
            let email_id = email_id.to_string();
            let from_field = from_field.to_string();
            let subject = subject.to_string();
            let snippet = snippet.to_string();
            let predicted_labels_json = serde_json::to_string(predicted_labels).unwrap_or_default();
            let actual_labels_json = serde_json::to_string(actual_labels).unwrap_or_default();
            let predicted_type = predicted_type.to_string();
            let actual_type = actual_type.clone();
            let now_str = now.to_rfc3339();
            self.pool.transaction(move |tx| {
                tx.execute(
                    "INSERT INTO corrections (
                        user_id, email_id, from_field, subject, snippet,
                        predicted_labels, actual_labels, predicted_type, actual_type, timestamp
                    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                    rusqlite::params![
                        user_id,
                        email_id,
                        from_field,
                        subject,
                        snippet,
                        predicted_labels_json,
                        actual_labels_json,
                        predicted_type,
                        actual_type,
                        now_str,
                    ],
                )?;
                Ok(tx.last_insert_rowid())
            })?
        };

        if actual_type != "uncategorized" {
            self.learn_from_correction(from_field, &actual_type)?;
            self.rules
                .insert_correction_rule(user_id, PatternType::SenderExact, from_field, &actual_type)?;
        } else {
            tracing::info!("skipping rule learning: uncategorized is not a learnable classification");
        }

        Ok(correction_id)
    }

    fn learn_from_correction(&self, from_field: &str, actual_type: &str) -> Result<(), StorageError> {
        let pattern_value = from_field.to_lowercase();
        let classification_json = serde_json::to_string(&LearnedClassification {
            mail_type: actual_type.to_string(),
        })
        .unwrap_or_default();
        let now = Utc::now().to_rfc3339();

        self.pool.transaction(move |tx| {
            let existing: Option<u32> = tx
                .query_row(
                    "SELECT support_count FROM learned_patterns
                     WHERE pattern_type = 'sender_exact' AND pattern_value = ?1",
                    [&pattern_value],
                    |row| row.get(0),
                )
                .ok();

            match existing {
                Some(support_count) => {
                    tx.execute(
                        "UPDATE learned_patterns SET support_count = ?1, last_seen = ?2
                         WHERE pattern_type = 'sender_exact' AND pattern_value = ?3",
                        rusqlite::params![support_count + 1, now, pattern_value],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO learned_patterns (
                            pattern_type, pattern_value, classification_json,
                            support_count, confidence, first_seen, last_seen
                        ) VALUES ('sender_exact', ?1, ?2, 1, 1.0, ?3, ?3)",
                        rusqlite::params![pattern_value, classification_json, now],
                    )?;
                }
            }
            Ok(())
        })
    }

    /// Patterns with `support_count >= min_support`, the gate for
    /// surfacing them as few-shot examples or allowlist candidates.
    pub fn get_high_confidence_patterns(&self, min_support: u32) -> Result<Vec<FewShotExample>, StorageError> {
        let conn = self.pool.read()?;
        let mut stmt = conn.prepare(
            "SELECT pattern_value, classification_json, support_count
             FROM learned_patterns
             WHERE pattern_type = 'sender_exact' AND support_count >= ?1
             ORDER BY support_count DESC",
        )?;
        let rows = stmt.query_map([min_support], |row| {
            let sender: String = row.get(0)?;
            let classification_json: String = row.get(1)?;
            let support_count: u32 = row.get(2)?;
            let mail_type = serde_json::from_str::<serde_json::Value>(&classification_json)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str().map(String::from)))
                .unwrap_or_else(|| "uncategorized".to_string());
            Ok(FewShotExample {
                sender,
                mail_type,
                support_count,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }

    /// Diverse, support-weighted examples for the LLM's few-shot block
    /// (spec.md §4.6, `≥3 support`).
    pub fn get_fewshot_examples(&self, limit: usize) -> Result<Vec<FewShotExample>, StorageError> {
        Ok(self
            .get_high_confidence_patterns(3)?
            .into_iter()
            .take(limit)
            .collect())
    }

    pub fn get_recent_corrections(&self, limit: usize) -> Result<Vec<Correction>, StorageError> {
        let conn = self.pool.read()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, email_id, from_field, subject, snippet,
                    predicted_labels, actual_labels, predicted_type, actual_type, timestamp
             FROM corrections ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let predicted_labels: String = row.get(6)?;
            let actual_labels: String = row.get(7)?;
            let timestamp: String = row.get(10)?;
            Ok(Correction {
                id: row.get(0)?,
                user_id: row.get(1)?,
                email_id: row.get(2)?,
                from_field: row.get(3)?,
                subject: row.get(4)?,
                snippet: row.get(5)?,
                predicted_labels: serde_json::from_str(&predicted_labels).unwrap_or_default(),
                actual_labels: serde_json::from_str(&actual_labels).unwrap_or_default(),
                predicted_type: row.get(8)?,
                actual_type: row.get(9)?,
                timestamp: timestamp.parse().unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }

    pub fn get_top_corrected_senders(&self, limit: usize) -> Result<Vec<(String, u64)>, StorageError> {
        let conn = self.pool.read()?;
        let mut stmt = conn.prepare(
            "SELECT from_field, COUNT(*) AS n FROM corrections
             GROUP BY from_field ORDER BY n DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }

    pub fn get_correction_stats(&self) -> Result<CorrectionStats, StorageError> {
        let conn = self.pool.read()?;
        let total_corrections: u64 = conn.query_row("SELECT COUNT(*) FROM corrections", [], |row| row.get(0))?;
        let high_confidence_patterns: u64 = conn.query_row(
            "SELECT COUNT(*) FROM learned_patterns WHERE support_count >= 3",
            [],
            |row| row.get(0),
        )?;
        Ok(CorrectionStats {
            total_corrections,
            high_confidence_patterns,
        })
    }
}
