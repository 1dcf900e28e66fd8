//! Guardrail layer: policy overrides applied between the classification
//! cascade (C3-C7) and the timeline synthesizer (C11). Three categories —
//! `never_surface`, `force_critical`, `force_non_critical` — with fixed
//! precedence `never_surface > force_critical > force_non_critical`
//! regardless of declaration order in the ruleset.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::model::ImportanceLevel;

const DEFAULT_GUARDRAILS_YAML: &str = include_str!("../config/guardrails.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailCategory {
    NeverSurface,
    ForceCritical,
    ForceNonCritical,
}

impl GuardrailCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailCategory::NeverSurface => "never_surface",
            GuardrailCategory::ForceCritical => "force_critical",
            GuardrailCategory::ForceNonCritical => "force_non_critical",
        }
    }
}

/// The resolved effect of the guardrail layer on one email, ready to be
/// folded into the entity's [`crate::model::TemporalAnnotation`] (C10
/// already applies after this; guardrails win over decay when they fire —
/// see [`GuardrailMatcher::resolve`]).
#[derive(Debug, Clone)]
pub struct GuardrailDecision {
    pub category: Option<GuardrailCategory>,
    pub matched_rule: Option<String>,
    /// `Some(importance)` when the guardrail forces a specific importance;
    /// `None` when nothing fired and the caller should use its own value.
    pub forced_importance: Option<ImportanceLevel>,
    pub hide_in_digest: bool,
}

impl GuardrailDecision {
    fn none() -> Self {
        GuardrailDecision {
            category: None,
            matched_rule: None,
            forced_importance: None,
            hide_in_digest: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawCategoryRules {
    #[serde(default)]
    subject_patterns: Vec<String>,
    #[serde(default)]
    body_phrases: Vec<String>,
    #[serde(default)]
    sender_domains: Vec<String>,
}

struct CompiledCategoryRules {
    subject_patterns: Vec<Regex>,
    body_phrases: Vec<String>,
    sender_domains: Vec<String>,
}

impl CompiledCategoryRules {
    fn from_raw(raw: RawCategoryRules) -> Self {
        let subject_patterns = raw
            .subject_patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "invalid guardrail pattern, skipping");
                    None
                }
            })
            .collect();
        CompiledCategoryRules {
            subject_patterns,
            body_phrases: raw.body_phrases,
            sender_domains: raw.sender_domains,
        }
    }

    fn matches(&self, sender_lower: &str, subject_lower: &str, snippet_lower: &str) -> Option<String> {
        for pattern in &self.subject_patterns {
            if pattern.is_match(subject_lower) {
                return Some(format!("subject_pattern: {}", pattern.as_str()));
            }
        }
        for phrase in &self.body_phrases {
            if snippet_lower.contains(&phrase.to_lowercase()) {
                return Some(format!("body_phrase: {phrase}"));
            }
        }
        for domain in &self.sender_domains {
            if sender_lower.ends_with(&domain.to_lowercase()) {
                return Some(format!("sender_domain: {domain}"));
            }
        }
        None
    }
}

/// Loaded once at startup; read-mostly afterward. Matching is
/// case-insensitive across subject, snippet, and sender.
pub struct GuardrailMatcher {
    never_surface: CompiledCategoryRules,
    force_critical: CompiledCategoryRules,
    force_non_critical: CompiledCategoryRules,
}

impl GuardrailMatcher {
    pub fn load(path: Option<&Path>) -> Self {
        let yaml = path
            .and_then(|p| std::fs::read_to_string(p).ok())
            .unwrap_or_else(|| {
                if let Some(p) = path {
                    tracing::warn!(path = %p.display(), "guardrails config not found, using bundled default ruleset");
                }
                DEFAULT_GUARDRAILS_YAML.to_string()
            });
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Self {
        let value: serde_yaml::Value = match serde_yaml::from_str(yaml) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse guardrails config, using empty ruleset");
                return GuardrailMatcher::empty();
            }
        };
        let mapping = match value.as_mapping() {
            Some(m) => m,
            None => return GuardrailMatcher::empty(),
        };

        let category = |name: &str| -> CompiledCategoryRules {
            mapping
                .get(serde_yaml::Value::String(name.to_string()))
                .and_then(|v| serde_yaml::from_value::<RawCategoryRules>(v.clone()).ok())
                .map(CompiledCategoryRules::from_raw)
                .unwrap_or_else(|| CompiledCategoryRules::from_raw(RawCategoryRules::default()))
        };

        GuardrailMatcher {
            never_surface: category("never_surface"),
            force_critical: category("force_critical"),
            force_non_critical: category("force_non_critical"),
        }
    }

    fn empty() -> Self {
        GuardrailMatcher {
            never_surface: CompiledCategoryRules::from_raw(RawCategoryRules::default()),
            force_critical: CompiledCategoryRules::from_raw(RawCategoryRules::default()),
            force_non_critical: CompiledCategoryRules::from_raw(RawCategoryRules::default()),
        }
    }

    /// Evaluates the fixed precedence `never_surface > force_critical >
    /// force_non_critical` and returns the first category that matches,
    /// or a no-op decision if none do.
    pub fn resolve(&self, from: &str, subject: &str, snippet: &str) -> GuardrailDecision {
        let sender_lower = from.to_lowercase();
        let subject_lower = subject.to_lowercase();
        let snippet_lower = snippet.to_lowercase();

        if let Some(matched_rule) = self.never_surface.matches(&sender_lower, &subject_lower, &snippet_lower) {
            tracing::info!(matched_rule = %matched_rule, "guardrail: never_surface");
            return GuardrailDecision {
                category: Some(GuardrailCategory::NeverSurface),
                matched_rule: Some(matched_rule),
                forced_importance: Some(ImportanceLevel::Routine),
                hide_in_digest: true,
            };
        }
        if let Some(matched_rule) = self.force_critical.matches(&sender_lower, &subject_lower, &snippet_lower) {
            tracing::info!(matched_rule = %matched_rule, "guardrail: force_critical");
            return GuardrailDecision {
                category: Some(GuardrailCategory::ForceCritical),
                matched_rule: Some(matched_rule),
                forced_importance: Some(ImportanceLevel::Critical),
                hide_in_digest: false,
            };
        }
        if let Some(matched_rule) = self.force_non_critical.matches(&sender_lower, &subject_lower, &snippet_lower) {
            tracing::info!(matched_rule = %matched_rule, "guardrail: force_non_critical");
            return GuardrailDecision {
                category: Some(GuardrailCategory::ForceNonCritical),
                matched_rule: Some(matched_rule),
                forced_importance: Some(ImportanceLevel::Routine),
                hide_in_digest: false,
            };
        }

        GuardrailDecision::none()
    }
}
