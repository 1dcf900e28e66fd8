//! Global deterministic type assignment (C4): a versioned YAML ruleset
//! mapping sender domains, subject patterns, body phrases, and
//! attachment extensions to a type with a fixed confidence. Pure after
//! construction — no I/O on the hot path.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

const DEFAULT_RULES_YAML: &str = include_str!("../../config/type_mapper_rules.yaml");

#[derive(Debug, Deserialize)]
struct RawTypeRules {
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    sender_domains: Vec<String>,
    #[serde(default)]
    subject_patterns: Vec<String>,
    #[serde(default)]
    body_phrases: Vec<String>,
    #[serde(default)]
    attachment_extensions: Vec<String>,
}

fn default_confidence() -> f64 {
    0.95
}

struct CompiledTypeRules {
    type_name: String,
    confidence: f64,
    sender_domains: Vec<String>,
    subject_patterns: Vec<Regex>,
    body_phrases: Vec<String>,
    attachment_extensions: Vec<String>,
}

/// A rule matched, with enough detail for audit (`matched_rule`).
#[derive(Debug, Clone)]
pub struct TypeMapperMatch {
    pub type_name: String,
    pub confidence: f64,
    pub matched_rule: String,
}

/// Loaded once at startup (or on explicit reload); read-mostly after
/// that. Matching is case-insensitive; first match inside a type group
/// wins in the order sender domain → subject pattern → body phrase →
/// attachment.
pub struct TypeMapper {
    version: String,
    rules: Vec<CompiledTypeRules>,
}

impl TypeMapper {
    /// Loads rules from `path`, falling back to the bundled default
    /// ruleset if `path` is `None` or unreadable.
    pub fn load(path: Option<&Path>) -> Self {
        let yaml = path
            .and_then(|p| std::fs::read_to_string(p).ok())
            .unwrap_or_else(|| {
                if let Some(p) = path {
                    tracing::warn!(path = %p.display(), "type mapper config not found, using bundled default ruleset");
                }
                DEFAULT_RULES_YAML.to_string()
            });
        Self::from_yaml(&yaml)
    }

    /// Parses a ruleset from a YAML string, preserving type declaration
    /// order (type-vs-type precedence follows document order; match
    /// order within a type always follows sender → subject → body →
    /// attachment regardless).
    pub fn from_yaml(yaml: &str) -> Self {
        let value: serde_yaml::Value = match serde_yaml::from_str(yaml) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse type mapper rules, using empty ruleset");
                return TypeMapper {
                    version: "unknown".to_string(),
                    rules: Vec::new(),
                };
            }
        };

        let mapping = match value.as_mapping() {
            Some(m) => m,
            None => {
                tracing::warn!("type mapper config is not a mapping, using empty ruleset");
                return TypeMapper {
                    version: "unknown".to_string(),
                    rules: Vec::new(),
                };
            }
        };

        let version = mapping
            .get(serde_yaml::Value::String("version".to_string()))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let mut rules = Vec::new();
        for (key, val) in mapping {
            let type_name = match key.as_str() {
                Some(s) if s != "version" && s != "last_updated" => s.to_string(),
                _ => continue,
            };
            let raw: RawTypeRules = match serde_yaml::from_value(val.clone()) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(type_name, error = %e, "skipping malformed type rules");
                    continue;
                }
            };
            let mut subject_patterns = Vec::new();
            for pattern in &raw.subject_patterns {
                match Regex::new(&format!("(?i){pattern}")) {
                    Ok(re) => subject_patterns.push(re),
                    Err(e) => {
                        tracing::warn!(pattern, error = %e, "invalid regex pattern, skipping");
                    }
                }
            }
            rules.push(CompiledTypeRules {
                type_name,
                confidence: raw.confidence,
                sender_domains: raw.sender_domains,
                subject_patterns,
                body_phrases: raw.body_phrases,
                attachment_extensions: raw.attachment_extensions,
            });
        }

        let rule_count: usize = rules
            .iter()
            .map(|r| r.sender_domains.len() + r.subject_patterns.len() + r.body_phrases.len())
            .sum();
        tracing::info!(version, types = rules.len(), rule_count, "type mapper initialized");

        TypeMapper { version, rules }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the first matching type, or `None` if nothing matches
    /// deterministically (the cascade falls through to the rules engine
    /// and then the LLM).
    pub fn get_deterministic_type(
        &self,
        sender_email: &str,
        subject: &str,
        snippet: &str,
        has_ics_attachment: bool,
    ) -> Option<TypeMapperMatch> {
        let sender_lower = sender_email.to_lowercase();
        let sender_lower = sender_lower.trim();
        let subject_lower = subject.to_lowercase();
        let snippet_lower = snippet.to_lowercase();

        for type_rules in &self.rules {
            let mut matched_rule = None;

            for domain_pattern in &type_rules.sender_domains {
                if matches_domain(sender_lower, domain_pattern) {
                    matched_rule = Some(format!("sender_domain: {domain_pattern}"));
                    break;
                }
            }

            if matched_rule.is_none() {
                for pattern in &type_rules.subject_patterns {
                    if pattern.is_match(&subject_lower) {
                        matched_rule = Some(format!("subject_pattern: {}", pattern.as_str()));
                        break;
                    }
                }
            }

            if matched_rule.is_none() {
                for phrase in &type_rules.body_phrases {
                    if snippet_lower.contains(&phrase.to_lowercase()) {
                        matched_rule = Some(format!("body_phrase: {phrase}"));
                        break;
                    }
                }
            }

            if matched_rule.is_none() && has_ics_attachment {
                for ext in &type_rules.attachment_extensions {
                    if ext == ".ics" || ext == ".vcs" {
                        matched_rule = Some(format!("attachment: {ext}"));
                        break;
                    }
                }
            }

            if let Some(matched_rule) = matched_rule {
                tracing::info!(
                    type_name = %type_rules.type_name,
                    confidence = type_rules.confidence,
                    matched_rule = %matched_rule,
                    "type mapper match"
                );
                return Some(TypeMapperMatch {
                    type_name: type_rules.type_name.clone(),
                    confidence: type_rules.confidence,
                    matched_rule,
                });
            }
        }

        None
    }
}

/// Supports exact match and `*@domain` wildcards.
fn matches_domain(email: &str, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();
    if pattern == email {
        return true;
    }
    if let Some(domain) = pattern.strip_prefix("*@") {
        return email.ends_with(&format!("@{domain}"));
    }
    false
}
