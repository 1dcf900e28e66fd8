//! Schema bootstrap (C1). Idempotent: `CREATE TABLE IF NOT EXISTS` plus
//! `ALTER TABLE ... ADD COLUMN` only when a column is missing. Bootstrap
//! performs no validation beyond creation — runtime checks belong to the
//! components that use each table (spec.md §4.1).

use rusqlite::Connection;

use super::StorageError;

/// A single migration step. `up` must be safe to re-run.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "classification, rules, and correction tables",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "entity and digest session tables",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "ab-test and category schema (persisted-state contract only; the A/B dashboard and category UI are external, out-of-scope consumers)",
        up: MIGRATION_V3_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    pattern_type TEXT NOT NULL,
    pattern TEXT NOT NULL,
    category TEXT NOT NULL,
    confidence INTEGER NOT NULL DEFAULT 85,
    use_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(user_id, pattern_type, pattern, category)
);

CREATE TABLE IF NOT EXISTS pending_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    pattern_type TEXT NOT NULL,
    pattern TEXT NOT NULL,
    category TEXT NOT NULL,
    seen_count INTEGER NOT NULL DEFAULT 1,
    last_seen TEXT NOT NULL,
    UNIQUE(user_id, pattern_type, pattern, category)
);

CREATE TABLE IF NOT EXISTS corrections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    email_id TEXT NOT NULL,
    from_field TEXT NOT NULL,
    subject TEXT NOT NULL,
    snippet TEXT NOT NULL,
    predicted_labels TEXT NOT NULL,
    actual_labels TEXT NOT NULL,
    predicted_type TEXT NOT NULL,
    actual_type TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS learned_patterns (
    pattern_type TEXT NOT NULL,
    pattern_value TEXT NOT NULL,
    classification_json TEXT NOT NULL,
    support_count INTEGER NOT NULL DEFAULT 1,
    confidence REAL NOT NULL DEFAULT 0.5,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    PRIMARY KEY (pattern_type, pattern_value)
);

CREATE INDEX IF NOT EXISTS idx_rules_user ON rules(user_id);
CREATE INDEX IF NOT EXISTS idx_pending_rules_user ON pending_rules(user_id);
CREATE INDEX IF NOT EXISTS idx_corrections_sender ON corrections(from_field);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS confidence_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT NOT NULL,
    mail_type TEXT NOT NULL,
    type_conf REAL NOT NULL,
    importance TEXT NOT NULL,
    importance_conf REAL NOT NULL,
    attention TEXT NOT NULL,
    attention_conf REAL NOT NULL,
    relationship TEXT NOT NULL,
    relationship_conf REAL NOT NULL,
    decider TEXT NOT NULL,
    reason TEXT NOT NULL,
    model_name TEXT NOT NULL,
    model_version TEXT NOT NULL,
    prompt_version TEXT NOT NULL,
    client_label TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(message_id, model_version, prompt_version)
);

CREATE TABLE IF NOT EXISTS email_threads (
    thread_id TEXT PRIMARY KEY,
    last_message_id TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS digest_sessions (
    id TEXT PRIMARY KEY,
    generated_ts TEXT NOT NULL,
    total_emails INTEGER NOT NULL,
    critical_count INTEGER NOT NULL,
    time_sensitive_count INTEGER NOT NULL,
    routine_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_confidence_logs_message ON confidence_logs(message_id);
"#;

const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    name TEXT PRIMARY KEY,
    friendly_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ab_test_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    variant TEXT NOT NULL,
    started_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ab_test_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES ab_test_runs(id),
    metric_name TEXT NOT NULL,
    metric_value REAL NOT NULL,
    recorded_at TEXT NOT NULL
);
"#;

/// Applies every migration in order. Safe to call on every process start.
pub fn apply_migrations(conn: &Connection) -> Result<(), StorageError> {
    for migration in MIGRATIONS {
        conn.execute_batch(migration.up).map_err(|e| {
            StorageError::Init(format!(
                "migration {} ({}) failed: {e}",
                migration.version, migration.description
            ))
        })?;
    }
    Ok(())
}
