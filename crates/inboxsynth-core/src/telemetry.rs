//! Telemetry sink (spec.md §6): structured events used both for runtime
//! thresholding (circuit breakers) and offline evaluation. The sink is a
//! pluggable trait; the default implementation forwards to `tracing` so
//! the crate never owns its own transport.

use std::sync::atomic::{AtomicU64, Ordering};

/// Structured events the pipeline emits. Kept as an enum (not a free-form
/// string) so sinks can pattern-match without parsing.
#[derive(Debug, Clone)]
pub enum StructuredEvent {
    LlmCallOk {
        stage: &'static str,
        attempt: u32,
    },
    LlmCallError {
        stage: &'static str,
        attempt: u32,
        reason: String,
    },
    LlmFallbackInvoked {
        reason: String,
    },
    ExtractInconsistent {
        email_id: String,
        issue: &'static str,
        recovered: bool,
    },
    StageLatency {
        stage: &'static str,
        millis: u64,
    },
    CircuitTransition {
        stage: &'static str,
        from: &'static str,
        to: &'static str,
    },
    IdempotencyDrop {
        message_id: String,
    },
}

/// Pluggable telemetry sink. Implementors must not block the caller for
/// long; the default [`TracingSink`] just emits a `tracing` event.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: StructuredEvent);
}

/// Default sink: forwards every event to `tracing` at an appropriate
/// level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: StructuredEvent) {
        match event {
            StructuredEvent::LlmCallOk { stage, attempt } => {
                tracing::debug!(stage, attempt, "LLM_CALL_OK");
            }
            StructuredEvent::LlmCallError {
                stage,
                attempt,
                reason,
            } => {
                tracing::warn!(stage, attempt, %reason, "LLM_CALL_ERROR");
            }
            StructuredEvent::LlmFallbackInvoked { reason } => {
                tracing::warn!(%reason, "LLM_FALLBACK_INVOKED");
            }
            StructuredEvent::ExtractInconsistent {
                email_id,
                issue,
                recovered,
            } => {
                tracing::warn!(%email_id, issue, recovered, "EXTRACT_INCONSISTENT");
            }
            StructuredEvent::StageLatency { stage, millis } => {
                tracing::debug!(stage, millis, "stage latency");
            }
            StructuredEvent::CircuitTransition { stage, from, to } => {
                tracing::info!(stage, from, to, "circuit breaker transition");
            }
            StructuredEvent::IdempotencyDrop { message_id } => {
                tracing::debug!(%message_id, "idempotency drop");
            }
        }
    }
}

/// In-memory sink for tests: counts events by a caller-supplied
/// classifier instead of asserting on log output.
#[derive(Default)]
pub struct CountingSink {
    pub idempotency_drops: AtomicU64,
    pub llm_fallbacks: AtomicU64,
    pub extract_inconsistent: AtomicU64,
}

impl TelemetrySink for CountingSink {
    fn record(&self, event: StructuredEvent) {
        match event {
            StructuredEvent::IdempotencyDrop { .. } => {
                self.idempotency_drops.fetch_add(1, Ordering::Relaxed);
            }
            StructuredEvent::LlmFallbackInvoked { .. } => {
                self.llm_fallbacks.fetch_add(1, Ordering::Relaxed);
            }
            StructuredEvent::ExtractInconsistent { .. } => {
                self.extract_inconsistent.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}
