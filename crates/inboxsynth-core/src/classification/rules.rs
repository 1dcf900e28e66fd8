//! User-specific learned patterns (C5): `pending_rules` accumulate
//! sightings, promoting to `rules` once confirmed twice; `rules` serves
//! classification lookups ahead of the LLM.

use chrono::Utc;

use crate::model::{ActiveRule, PatternType, PendingRule};
use crate::storage::Pool;
use crate::storage::StorageError;

/// Result of feeding one sighting into the pending-rule table.
#[derive(Debug, Clone)]
pub enum PromotionOutcome {
    StillPending { seen_count: u32 },
    Promoted(ActiveRule),
}

#[derive(Debug, Clone, Default)]
pub struct RuleStats {
    pub total_rules: u64,
    pub by_type: Vec<(String, u64)>,
    pub by_category: Vec<(String, u64)>,
}

/// User-specific classification rules backed by the shared pool.
pub struct RulesEngine<'p> {
    pool: &'p Pool,
}

impl<'p> RulesEngine<'p> {
    pub fn new(pool: &'p Pool) -> Self {
        RulesEngine { pool }
    }

    /// `classify(subject, snippet, from_field, user_id)`: sender-exact
    /// first, then subject-contains, then keyword. Within a tier, the
    /// highest-confidence applicable rule wins.
    pub fn classify(
        &self,
        subject: &str,
        snippet: &str,
        from_field: &str,
        user_id: &str,
    ) -> Result<Option<ActiveRule>, StorageError> {
        let conn = self.pool.read()?;
        let haystack = format!("{subject} {snippet}").to_lowercase();

        // Tier 1: sender_exact.
        let mut stmt = conn.prepare(
            "SELECT id, user_id, pattern_type, pattern, category, confidence, use_count
             FROM rules WHERE user_id = ?1 AND pattern_type = 'sender_exact'
             ORDER BY confidence DESC",
        )?;
        let rows = stmt.query_map([user_id], row_to_active_rule)?;
        for row in rows {
            let rule = row?;
            if from_field.to_lowercase() == rule.pattern.to_lowercase() {
                return Ok(Some(rule));
            }
        }
        drop(stmt);

        // Tier 2: subject_contains.
        let mut stmt = conn.prepare(
            "SELECT id, user_id, pattern_type, pattern, category, confidence, use_count
             FROM rules WHERE user_id = ?1 AND pattern_type = 'subject_contains'
             ORDER BY confidence DESC",
        )?;
        let rows = stmt.query_map([user_id], row_to_active_rule)?;
        for row in rows {
            let rule = row?;
            if subject.to_lowercase().contains(&rule.pattern.to_lowercase()) {
                return Ok(Some(rule));
            }
        }
        drop(stmt);

        // Tier 3: keyword, against subject + snippet.
        let mut stmt = conn.prepare(
            "SELECT id, user_id, pattern_type, pattern, category, confidence, use_count
             FROM rules WHERE user_id = ?1 AND pattern_type = 'keyword'
             ORDER BY confidence DESC",
        )?;
        let rows = stmt.query_map([user_id], row_to_active_rule)?;
        for row in rows {
            let rule = row?;
            if haystack.contains(&rule.pattern.to_lowercase()) {
                return Ok(Some(rule));
            }
        }

        Ok(None)
    }

    /// Feeds a new observation into `pending_rules`. First sighting
    /// creates the row; the second promotes it into `rules` at
    /// confidence 85 and deletes the pending row. Never called for
    /// `category = "uncategorized"`.
    pub fn record_sighting(
        &self,
        user_id: &str,
        pattern_type: PatternType,
        pattern: &str,
        category: &str,
    ) -> Result<PromotionOutcome, StorageError> {
        debug_assert_ne!(category, "uncategorized");
        let user_id = user_id.to_string();
        let pattern = pattern.to_string();
        let category = category.to_string();
        let now = Utc::now();

        self.pool.transaction(move |tx| {
            let existing: Option<u32> = tx
                .query_row(
                    "SELECT seen_count FROM pending_rules
                     WHERE user_id = ?1 AND pattern_type = ?2 AND pattern = ?3 AND category = ?4",
                    rusqlite::params![user_id, pattern_type.as_str(), pattern, category],
                    |row| row.get(0),
                )
                .ok();

            match existing {
                None => {
                    tx.execute(
                        "INSERT INTO pending_rules (user_id, pattern_type, pattern, category, seen_count, last_seen)
                         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                        rusqlite::params![user_id, pattern_type.as_str(), pattern, category, now.to_rfc3339()],
                    )?;
                    Ok(PromotionOutcome::StillPending { seen_count: 1 })
                }
                Some(seen_count) if seen_count + 1 < 2 => {
                    tx.execute(
                        "UPDATE pending_rules SET seen_count = seen_count + 1, last_seen = ?1
                         WHERE user_id = ?2 AND pattern_type = ?3 AND pattern = ?4 AND category = ?5",
                        rusqlite::params![now.to_rfc3339(), user_id, pattern_type.as_str(), pattern, category],
                    )?;
                    Ok(PromotionOutcome::StillPending { seen_count: seen_count + 1 })
                }
                Some(_) => {
                    tx.execute(
                        "INSERT INTO rules (user_id, pattern_type, pattern, category, confidence)
                         VALUES (?1, ?2, ?3, ?4, 85)
                         ON CONFLICT(user_id, pattern_type, pattern, category)
                         DO UPDATE SET confidence = excluded.confidence",
                        rusqlite::params![user_id, pattern_type.as_str(), pattern, category],
                    )?;
                    tx.execute(
                        "DELETE FROM pending_rules
                         WHERE user_id = ?1 AND pattern_type = ?2 AND pattern = ?3 AND category = ?4",
                        rusqlite::params![user_id, pattern_type.as_str(), pattern, category],
                    )?;
                    let rule = tx.query_row(
                        "SELECT id, user_id, pattern_type, pattern, category, confidence, use_count
                         FROM rules WHERE user_id = ?1 AND pattern_type = ?2 AND pattern = ?3 AND category = ?4",
                        rusqlite::params![user_id, pattern_type.as_str(), pattern, category],
                        row_to_active_rule,
                    )?;
                    Ok(PromotionOutcome::Promoted(rule))
                }
            }
        })
    }

    /// Inserts (or refreshes) a rule directly at confidence 95, bypassing
    /// `pending_rules` — the path used for user corrections (C8).
    pub fn insert_correction_rule(
        &self,
        user_id: &str,
        pattern_type: PatternType,
        pattern: &str,
        category: &str,
    ) -> Result<(), StorageError> {
        let user_id = user_id.to_string();
        let pattern = pattern.to_string();
        let category = category.to_string();
        self.pool.transaction(move |tx| {
            tx.execute(
                "INSERT INTO rules (user_id, pattern_type, pattern, category, confidence)
                 VALUES (?1, ?2, ?3, ?4, 95)
                 ON CONFLICT(user_id, pattern_type, pattern, category)
                 DO UPDATE SET confidence = 95",
                rusqlite::params![user_id, pattern_type.as_str(), pattern, category],
            )?;
            Ok(())
        })
    }

    pub fn get_pending_rules(&self, user_id: &str) -> Result<Vec<PendingRule>, StorageError> {
        let conn = self.pool.read()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, pattern_type, pattern, category, seen_count, last_seen
             FROM pending_rules WHERE user_id = ?1 ORDER BY last_seen DESC",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            let pattern_type: String = row.get(1)?;
            let last_seen: String = row.get(5)?;
            Ok(PendingRule {
                user_id: row.get(0)?,
                pattern_type: PatternType::parse(&pattern_type).unwrap_or(PatternType::Keyword),
                pattern: row.get(2)?,
                category: row.get(3)?,
                seen_count: row.get(4)?,
                last_seen: last_seen
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }

    pub fn get_rule_stats(&self) -> Result<RuleStats, StorageError> {
        let conn = self.pool.read()?;
        let total_rules: u64 = conn.query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;

        let mut stmt = conn.prepare("SELECT pattern_type, COUNT(*) FROM rules GROUP BY pattern_type")?;
        let by_type = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM rules GROUP BY category ORDER BY COUNT(*) DESC",
        )?;
        let by_category = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleStats {
            total_rules,
            by_type,
            by_category,
        })
    }
}

fn row_to_active_rule(row: &rusqlite::Row) -> rusqlite::Result<ActiveRule> {
    let pattern_type: String = row.get(2)?;
    Ok(ActiveRule {
        id: row.get(0)?,
        user_id: row.get(1)?,
        pattern_type: PatternType::parse(&pattern_type).unwrap_or(PatternType::Keyword),
        pattern: row.get(3)?,
        category: row.get(4)?,
        confidence: row.get(5)?,
        use_count: row.get(6)?,
    })
}
