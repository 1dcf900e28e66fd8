//! Prompted multi-axis classifier (C6): the last stage of the cascade.
//! Owns input sanitization, JSON extraction/repair, schema validation,
//! and the "always produce a result" fallback contract.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use regex::Regex;

use crate::adapters::LlmAdapter;
use crate::config::Config;
use crate::model::{
    Attention, Classification, Decider, ImportanceLevel, MailType, ModelVersion, ProposeRule,
    Relationship,
};
use crate::retry::{CircuitBreaker, RetryPolicy};
use crate::telemetry::{StructuredEvent, TelemetrySink};

const MAX_FIELD_CHARS: usize = 600;
const SCHEMA_HINT: &str =
    "Return only the JSON object matching the schema, with no surrounding text.";

/// Strips known prompt-injection patterns, role tokens, and template
/// markers from user-controlled text before it enters the prompt, then
/// truncates to a length cap.
pub fn sanitize_field(input: &str) -> String {
    let injection_markers: &[&str] = &[
        "ignore previous instructions",
        "ignore all previous instructions",
        "disregard the above",
        "system:",
        "assistant:",
        "user:",
    ];
    let mut sanitized = input.to_string();
    for marker in injection_markers {
        let re = Regex::new(&format!("(?i){}", regex::escape(marker))).unwrap();
        sanitized = re.replace_all(&sanitized, "[redacted]").into_owned();
    }
    sanitized = sanitized.replace('{', "(").replace('}', ")");
    sanitized.chars().take(MAX_FIELD_CHARS).collect()
}

fn build_prompt(from: &str, subject: &str, snippet: &str, fewshot: &str, hint: Option<&str>) -> String {
    let from = sanitize_field(from);
    let subject = sanitize_field(subject);
    let snippet = sanitize_field(snippet);
    let mut prompt = format!(
        "Classify this email along type, importance, attention, and relationship.\n\n\
         {fewshot}\n\n\
         From: {from}\n\
         Subject: {subject}\n\
         Snippet: {snippet}\n\n\
         Respond with a single JSON object with fields: \
         mail_type, type_conf, importance, importance_conf, attention, attention_conf, \
         relationship, relationship_conf, reason.",
    );
    if let Some(hint) = hint {
        prompt.push_str("\n\n");
        prompt.push_str(hint);
    }
    prompt
}

/// Removes fenced code blocks, then attempts a strict parse; on failure,
/// locates the largest `{...}` span and applies a small progressive
/// repair cascade (trailing commas, missing commas between adjacent
/// values). Returns the repair step that succeeded, for logging.
fn extract_json(raw: &str) -> Result<(serde_json::Value, &'static str), String> {
    let fence_re = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap();
    let unfenced = fence_re
        .captures(raw)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| raw.to_string());

    if let Ok(v) = serde_json::from_str(&unfenced) {
        return Ok((v, "strict"));
    }

    let start = unfenced.find('{');
    let end = unfenced.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if e > s => (s, e),
        _ => return Err("no JSON object span found".to_string()),
    };
    let span = &unfenced[start..=end];

    if let Ok(v) = serde_json::from_str(span) {
        return Ok((v, "span"));
    }

    let no_trailing_commas = Regex::new(r",\s*([}\]])").unwrap().replace_all(span, "$1");
    if let Ok(v) = serde_json::from_str(&no_trailing_commas) {
        return Ok((v, "drop_trailing_commas"));
    }

    let missing_comma = Regex::new(r#"("|\d|true|false|null)\s*\n\s*""#)
        .unwrap()
        .replace_all(&no_trailing_commas, "$1,\n\"");
    if let Ok(v) = serde_json::from_str(&missing_comma) {
        return Ok((v, "insert_missing_commas"));
    }

    Err("all repair strategies exhausted".to_string())
}

fn field_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn field_f64(value: &serde_json::Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| v.as_f64())
}

fn parse_raw_classification(value: &serde_json::Value, version: ModelVersion) -> Option<Classification> {
    let mail_type = MailType::parse(&field_str(value, "mail_type")?)?;
    let importance = ImportanceLevel::parse(&field_str(value, "importance")?)?;
    let attention = Attention::parse(&field_str(value, "attention")?)?;
    let relationship = Relationship::parse(&field_str(value, "relationship")?)?;
    Some(Classification {
        mail_type,
        type_conf: field_f64(value, "type_conf")?,
        importance,
        importance_conf: field_f64(value, "importance_conf")?,
        attention,
        attention_conf: field_f64(value, "attention_conf")?,
        relationship,
        relationship_conf: field_f64(value, "relationship_conf")?,
        decider: Decider::Gemini,
        reason: field_str(value, "reason").unwrap_or_default(),
        propose_rule: ProposeRule::none(),
        version,
        normalized_input_digest: None,
    })
}

/// Deterministic, low-confidence output used whenever the LLM pass can't
/// produce a validated classification at all.
pub fn safe_fallback(version: ModelVersion, reason: &str) -> Classification {
    Classification {
        mail_type: MailType::Uncategorized,
        type_conf: 0.1,
        importance: ImportanceLevel::Routine,
        importance_conf: 0.1,
        attention: Attention::None,
        attention_conf: 0.1,
        relationship: Relationship::FromUnknown,
        relationship_conf: 0.1,
        decider: Decider::GeminiFallback,
        reason: reason.to_string(),
        propose_rule: ProposeRule::none(),
        version,
        normalized_input_digest: None,
    }
}

/// Outcome of one adapter call, classified for retryability (spec.md
/// §4.6/§7): `Timeout` and `Permanent` are never retried; only
/// `Transient` goes through [`RetryPolicy`]'s backoff.
#[derive(Debug, Clone)]
enum AdapterFailure {
    Timeout(String),
    Permanent(String),
    Transient(String),
}

impl fmt::Display for AdapterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterFailure::Timeout(msg) => write!(f, "timeout: {msg}"),
            AdapterFailure::Permanent(msg) => write!(f, "permanent: {msg}"),
            AdapterFailure::Transient(msg) => write!(f, "transient: {msg}"),
        }
    }
}

/// The LLM classification stage. Generic over the adapter so tests can
/// supply a canned or failing implementation.
pub struct LlmClassifier<A: LlmAdapter> {
    adapter: Arc<A>,
    config: Config,
    telemetry: Arc<dyn TelemetrySink>,
    invalid_json_breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl<A: LlmAdapter> LlmClassifier<A> {
    pub fn new(adapter: A, config: Config, telemetry: Arc<dyn TelemetrySink>) -> Self {
        LlmClassifier {
            adapter: Arc::new(adapter),
            config,
            telemetry,
            invalid_json_breaker: CircuitBreaker::new(
                "llm_invalid_json",
                5,
                Duration::from_secs(60),
            ),
            retry: RetryPolicy::adapter_default(),
        }
    }

    fn version(&self) -> ModelVersion {
        ModelVersion {
            model_name: self.config.model_name.clone(),
            model_version: self.config.model_version.clone(),
            prompt_version: self.config.prompt_version.clone(),
        }
    }

    /// Runs one adapter call on a detached background thread and waits
    /// for it with `self.config.llm_timeout`, rather than trusting the
    /// adapter/SDK to enforce its own timeout (spec.md §4.6 step 2, §5).
    /// If the timeout elapses first, the background call is left to run
    /// to completion on its own (best-effort cancellation, spec.md §5);
    /// this call returns `AdapterFailure::Timeout` immediately.
    fn call_once(&self, prompt: &str) -> Result<String, AdapterFailure> {
        let (tx, rx) = std::sync::mpsc::channel();
        let adapter = self.adapter.clone();
        let prompt = prompt.to_string();

        let spawned = thread::Builder::new()
            .name("inboxsynth-llm-call".to_string())
            .spawn(move || {
                let result = adapter.generate(&prompt, 0.2, 0.9, 512);
                let _ = tx.send(result);
            });

        if spawned.is_err() {
            return Err(AdapterFailure::Transient(
                "failed to spawn llm call thread".to_string(),
            ));
        }

        match rx.recv_timeout(self.config.llm_timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                let reason = e.to_string();
                if self.adapter.is_permanent(&e) {
                    Err(AdapterFailure::Permanent(reason))
                } else {
                    Err(AdapterFailure::Transient(reason))
                }
            }
            Err(_) => Err(AdapterFailure::Timeout(format!(
                "no response within {:?}",
                self.config.llm_timeout
            ))),
        }
    }

    /// Retries only `AdapterFailure::Transient` under the backoff policy;
    /// timeouts and permanent errors are surfaced on the first attempt
    /// (spec.md §4.6: "on timeout, raise timeout immediately"; §7: 4xx/
    /// permanent errors are "never retried").
    fn call_model(&self, prompt: &str, attempt_tag: u32) -> Result<String, String> {
        self.retry
            .execute(
                |failure: &AdapterFailure| matches!(failure, AdapterFailure::Transient(_)),
                |attempt| match self.call_once(prompt) {
                    Ok(text) => {
                        self.telemetry.record(StructuredEvent::LlmCallOk {
                            stage: "llm_classify",
                            attempt,
                        });
                        Ok(text)
                    }
                    Err(failure) => {
                        self.telemetry.record(StructuredEvent::LlmCallError {
                            stage: "llm_classify",
                            attempt,
                            reason: failure.to_string(),
                        });
                        Err(failure)
                    }
                },
            )
            .map_err(|e| format!("attempt {attempt_tag}: {e}"))
    }

    /// Classifies one email. Never returns `Err`: on any unrecoverable
    /// failure it returns [`safe_fallback`] instead.
    pub fn classify(&self, from: &str, subject: &str, snippet: &str, fewshot: &str) -> Classification {
        if self.config.feature_gates().test_mode {
            return self.classify_test_mode(from, subject, snippet);
        }

        if self.invalid_json_breaker.try_acquire().is_err() {
            self.telemetry.record(StructuredEvent::LlmFallbackInvoked {
                reason: "circuit_breaker_tripped".to_string(),
            });
            return safe_fallback(self.version(), "circuit_breaker_tripped");
        }

        let prompt = build_prompt(from, subject, snippet, fewshot, None);
        let raw = match self.call_model(&prompt, 1) {
            Ok(r) => r,
            Err(reason) => {
                self.invalid_json_breaker.record_failure();
                self.telemetry.record(StructuredEvent::LlmFallbackInvoked {
                    reason: reason.clone(),
                });
                return safe_fallback(self.version(), &reason);
            }
        };

        if let Some(classification) = self.try_parse_and_validate(&raw) {
            self.invalid_json_breaker.record_success();
            return classification;
        }

        // One retry with a schema-reminder hint appended.
        let retry_prompt = build_prompt(from, subject, snippet, fewshot, Some(SCHEMA_HINT));
        let raw_retry = match self.call_model(&retry_prompt, 2) {
            Ok(r) => r,
            Err(reason) => {
                self.invalid_json_breaker.record_failure();
                self.telemetry.record(StructuredEvent::LlmFallbackInvoked {
                    reason: reason.clone(),
                });
                return safe_fallback(self.version(), &reason);
            }
        };

        match self.try_parse_and_validate(&raw_retry) {
            Some(classification) => {
                self.invalid_json_breaker.record_success();
                classification
            }
            None => {
                self.invalid_json_breaker.record_failure();
                self.telemetry.record(StructuredEvent::LlmFallbackInvoked {
                    reason: "validation_failed_twice".to_string(),
                });
                safe_fallback(self.version(), "validation_failed_twice")
            }
        }
    }

    fn try_parse_and_validate(&self, raw: &str) -> Option<Classification> {
        let (value, repair_step) = extract_json(raw).ok()?;
        tracing::debug!(repair_step, "json repair step used");
        let classification = parse_raw_classification(&value, self.version())?;
        classification.validate().ok()?;
        Some(classification)
    }

    /// `test_mode`: routes around the adapter entirely with a
    /// deterministic, rule-free classification so CI never depends on a
    /// live model.
    fn classify_test_mode(&self, _from: &str, subject: &str, _snippet: &str) -> Classification {
        let subject_lower = subject.to_lowercase();
        let mail_type = if subject_lower.contains("otp") || subject_lower.contains("verification") {
            MailType::Otp
        } else {
            MailType::Message
        };
        Classification {
            mail_type,
            type_conf: 0.8,
            importance: ImportanceLevel::Routine,
            importance_conf: 0.6,
            attention: Attention::None,
            attention_conf: 0.6,
            relationship: Relationship::FromUnknown,
            relationship_conf: 0.5,
            decider: Decider::Gemini,
            reason: "test_mode deterministic stub".to_string(),
            propose_rule: ProposeRule::none(),
            version: self.version(),
            normalized_input_digest: None,
        }
    }
}
