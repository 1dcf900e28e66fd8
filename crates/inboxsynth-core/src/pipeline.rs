//! Pipeline coordinator (C12): fetch → strict-parse → dedup → classify →
//! extract → decay → synthesize → render → checkpoint. Owns the bounded
//! worker pool for parse/classify and the order-preserving reassembly
//! that keeps parallel runs byte-identical to the sequential path.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::adapters::{LlmAdapter, MailProviderAdapter};
use crate::classification::cascade::Cascade;
use crate::config::Config;
use crate::entities::ExtractorEngine;
use crate::error::Error;
use crate::feedback::FeedbackManager;
use crate::guardrails::GuardrailMatcher;
use crate::model::{Classification, Digest, Entity, ImportanceLevel, ParsedEmail, RawMessage};
use crate::retry::IdempotencySet;
use crate::storage::Pool;
use crate::telemetry::{StructuredEvent, TelemetrySink};
use crate::temporal::annotate_entity;
use crate::timeline::{ClassifiedEmail, TimelineSynthesizer};

/// Rendered digest output: plain text is always produced; HTML only when
/// `FeatureGates::hybrid_renderer` is set (spec.md §9).
pub struct Rendering {
    pub text: String,
    pub html: Option<String>,
}

/// Per-message outcome of the classify/extract/decay stages, kept around
/// long enough to drive both synthesis and (eventually) persistence.
struct Processed {
    email: ParsedEmail,
    classification: Classification,
    entity: Option<Entity>,
}

/// Observes `cancel()` at each stage boundary; best-effort — an in-flight
/// LLM call is only interrupted by its own timeout (spec.md §5).
pub trait CancelSignal: Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancelSignal for std::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Never cancels; used by callers with no cooperative cancellation path.
pub struct NeverCancel;
impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

fn record_latency(telemetry: &dyn TelemetrySink, stage: &'static str, start: Instant) {
    telemetry.record(StructuredEvent::StageLatency {
        stage,
        millis: start.elapsed().as_millis() as u64,
    });
}

pub struct PipelineCoordinator<'p, A: LlmAdapter> {
    pool: &'p Pool,
    cascade: Cascade<'p, A>,
    feedback: FeedbackManager<'p>,
    extractor: ExtractorEngine,
    guardrails: GuardrailMatcher,
    synthesizer: TimelineSynthesizer,
    config: Config,
    telemetry: Arc<dyn TelemetrySink>,
}

impl<'p, A: LlmAdapter + Sync> PipelineCoordinator<'p, A> {
    pub fn new(pool: &'p Pool, cascade: Cascade<'p, A>, config: Config, telemetry: Arc<dyn TelemetrySink>) -> Self {
        PipelineCoordinator {
            pool,
            cascade,
            feedback: FeedbackManager::new(pool),
            extractor: ExtractorEngine::new(telemetry.clone()),
            guardrails: GuardrailMatcher::load(None),
            synthesizer: TimelineSynthesizer::new(),
            config,
            telemetry,
        }
    }

    /// Runs one batch end to end. `parallel` routes parse/classify over a
    /// bounded worker pool; the result is reordered back to fetch order
    /// before synthesis so sequential and parallel runs are identical.
    pub fn run_batch<M: MailProviderAdapter>(
        &self,
        mail: &M,
        user_id: &str,
        max_messages: usize,
        now: DateTime<Utc>,
        parallel: bool,
        cancel: &dyn CancelSignal,
    ) -> Result<Digest, Error> {
        let raw_messages = self.fetch(mail, max_messages, cancel)?;
        let parsed = self.parse_stage(raw_messages, parallel);
        let deduped = self.dedup_stage(parsed);

        if deduped.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let total_emails = deduped.len();
        let fewshot = self.fewshot_block()?;
        let processed = self.classify_and_extract_stage(deduped, user_id, &fewshot, now, parallel, cancel)?;
        let digest = self.synthesize(&processed, total_emails, now);

        let start = Instant::now();
        let report = self.pool.checkpoint()?;
        record_latency(&*self.telemetry, "checkpoint", start);
        tracing::info!(
            bytes_reclaimed = report.bytes_reclaimed,
            frames_checkpointed = report.frames_checkpointed,
            "wal checkpoint complete"
        );

        Ok(digest)
    }

    fn fetch<M: MailProviderAdapter>(
        &self,
        mail: &M,
        max_messages: usize,
        cancel: &dyn CancelSignal,
    ) -> Result<Vec<RawMessage>, Error> {
        let start = Instant::now();
        let ids = mail
            .list_ids(max_messages)
            .map_err(|e| Error::TransientAdapter(e.to_string()))?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            if cancel.is_cancelled() {
                tracing::warn!("fetch cancelled, returning partial batch");
                break;
            }
            match mail.get_message(&id) {
                Ok(Some(msg)) => messages.push(msg),
                Ok(None) => tracing::debug!(id, "message no longer resolves, skipping"),
                Err(e) => return Err(Error::TransientAdapter(e.to_string())),
            }
        }
        record_latency(&*self.telemetry, "fetch", start);
        Ok(messages)
    }

    fn parse_stage(&self, raw_messages: Vec<RawMessage>, parallel: bool) -> Vec<ParsedEmail> {
        let start = Instant::now();
        let parsed: Vec<Option<ParsedEmail>> = if parallel {
            raw_messages
                .par_iter()
                .map(|raw| match ParsedEmail::parse(raw) {
                    Ok(email) => Some(email),
                    Err(e) => {
                        tracing::warn!(message_id = %e.message_id, reason = %e.reason, "PARSE_ERROR");
                        None
                    }
                })
                .collect()
        } else {
            raw_messages
                .iter()
                .map(|raw| match ParsedEmail::parse(raw) {
                    Ok(email) => Some(email),
                    Err(e) => {
                        tracing::warn!(message_id = %e.message_id, reason = %e.reason, "PARSE_ERROR");
                        None
                    }
                })
                .collect()
        };
        record_latency(&*self.telemetry, "parse", start);
        parsed.into_iter().flatten().collect()
    }

    fn dedup_stage(&self, parsed: Vec<ParsedEmail>) -> Vec<ParsedEmail> {
        let start = Instant::now();
        let seen = IdempotencySet::new();
        let mut deduped = Vec::with_capacity(parsed.len());
        for email in parsed {
            let key = crate::model::IdempotencyKey::derive(&email);
            if seen.is_duplicate(&key) {
                self.telemetry.record(StructuredEvent::IdempotencyDrop {
                    message_id: email.message_id.clone(),
                });
                continue;
            }
            deduped.push(email);
        }
        record_latency(&*self.telemetry, "dedup", start);
        deduped
    }

    fn fewshot_block(&self) -> Result<String, Error> {
        let examples = self.feedback.get_fewshot_examples(10)?;
        if examples.is_empty() {
            return Ok(String::new());
        }
        let mut block = String::from("Examples learned from your corrections:\n");
        for example in examples {
            block.push_str(&format!(
                "- {} -> {} (seen {} times)\n",
                example.sender, example.mail_type, example.support_count
            ));
        }
        Ok(block)
    }

    fn classify_and_extract_stage(
        &self,
        emails: Vec<ParsedEmail>,
        user_id: &str,
        fewshot: &str,
        now: DateTime<Utc>,
        parallel: bool,
        cancel: &dyn CancelSignal,
    ) -> Result<Vec<Processed>, Error> {
        let start = Instant::now();

        let classify_one = |email: ParsedEmail| -> Result<Processed, Error> {
            let snippet = email.snippet(1000);
            let has_ics = email
                .has_attachment_extensions
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(".ics"));
            let classification = self.cascade.classify(
                user_id,
                &email.from_address,
                &email.subject,
                &snippet,
                has_ics,
                fewshot,
            )?;

            let entity = self.extractor.extract(&email, &classification);
            let entity = entity.map(|e| annotate_entity(e, now));

            let guardrail = self.guardrails.resolve(&email.from_address, &email.subject, &snippet);
            let (classification, entity) = apply_guardrail(classification, entity, &guardrail);

            Ok(Processed {
                email,
                classification,
                entity,
            })
        };

        let results: Vec<Result<Processed, Error>> = if parallel {
            emails
                .into_par_iter()
                .map(|email| {
                    if cancel.is_cancelled() {
                        return Err(Error::TransientAdapter("cancelled".to_string()));
                    }
                    classify_one(email)
                })
                .collect()
        } else {
            emails
                .into_iter()
                .map(|email| {
                    if cancel.is_cancelled() {
                        return Err(Error::TransientAdapter("cancelled".to_string()));
                    }
                    classify_one(email)
                })
                .collect()
        };

        record_latency(&*self.telemetry, "classify_extract_decay", start);

        // Order is already fetch-order for both branches: rayon's
        // `par_iter().map().collect()` preserves input order by
        // construction, so parallel and sequential runs produce the same
        // sequence without an explicit re-sort.
        results.into_iter().collect()
    }

    fn synthesize(&self, processed: &[Processed], total_emails: usize, now: DateTime<Utc>) -> Digest {
        let start = Instant::now();
        let items: Vec<ClassifiedEmail<'_>> = processed
            .iter()
            .map(|p| ClassifiedEmail {
                email: &p.email,
                classification: &p.classification,
                entity: p.entity.clone(),
            })
            .collect();
        let digest = self.synthesizer.build(&items, now);
        record_latency(&*self.telemetry, "synthesize", start);
        let _ = total_emails;
        digest
    }

    /// Renders the digest as plain text, and additionally as HTML if
    /// `hybrid_renderer` is enabled (spec.md §9 feature gate).
    pub fn render(&self, digest: &Digest) -> Rendering {
        let start = Instant::now();
        let text = render_text(digest);
        let html = if self.config.feature_gates().hybrid_renderer {
            Some(render_html(digest))
        } else {
            None
        };
        record_latency(&*self.telemetry, "render", start);
        Rendering { text, html }
    }
}

/// Folds a guardrail decision into the classification/entity pair. Runs
/// after C10 decay so guardrails always win over a computed resolved
/// importance, never the reverse.
fn apply_guardrail(
    mut classification: Classification,
    mut entity: Option<Entity>,
    decision: &crate::guardrails::GuardrailDecision,
) -> (Classification, Option<Entity>) {
    let Some(forced) = decision.forced_importance else {
        return (classification, entity);
    };

    classification.importance = forced;
    if let Some(entity) = entity.as_mut() {
        let decay_reason = if decision.hide_in_digest {
            crate::model::DecayReason::TemporalExpired
        } else {
            entity
                .temporal
                .map(|t| t.decay_reason)
                .unwrap_or(crate::model::DecayReason::NoTemporalData)
        };
        entity.temporal = Some(crate::model::TemporalAnnotation {
            resolved_importance: forced,
            decay_reason,
            hide_in_digest: decision.hide_in_digest,
        });
    }
    (classification, entity)
}

fn render_text(digest: &Digest) -> String {
    use crate::model::Section;
    let mut out = String::new();
    let counts = digest.section_counts();
    for section in Section::ORDER {
        let count = counts.get(&section).copied().unwrap_or(0);
        out.push_str(&format!("{} ({count})\n", section.heading()));
        if section == Section::EverythingElse {
            for (label, n) in &digest.noise_summary {
                out.push_str(&format!("  - {n} {label}\n"));
            }
            continue;
        }
        for item in digest.items.iter().filter(|i| i.section == section) {
            out.push_str(&format!("  - {} ({})\n", item.title, item.gmail_thread_link));
        }
        out.push('\n');
    }
    out
}

fn render_html(digest: &Digest) -> String {
    use crate::model::Section;
    let mut out = String::from("<div class=\"digest\">");
    let counts = digest.section_counts();
    for section in Section::ORDER {
        let count = counts.get(&section).copied().unwrap_or(0);
        out.push_str(&format!(
            "<section><h2>{} ({count})</h2><ul>",
            section.heading()
        ));
        if section == Section::EverythingElse {
            for (label, n) in &digest.noise_summary {
                out.push_str(&format!("<li>{n} {label}</li>"));
            }
        } else {
            for item in digest.items.iter().filter(|i| i.section == section) {
                out.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>",
                    item.gmail_thread_link, item.title
                ));
            }
        }
        out.push_str("</ul></section>");
    }
    out.push_str("</div>");
    out
}
