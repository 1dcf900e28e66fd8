//! The classification cascade: type mapper (C4) → rules engine (C5) →
//! LLM classifier (C6), orchestrated by the cascade (C7).

pub mod cascade;
pub mod llm;
pub mod rules;
pub mod type_mapper;

pub use cascade::{client_label, Cascade, LEARNING_MIN_CONFIDENCE};
pub use llm::{safe_fallback, sanitize_field, LlmClassifier};
pub use rules::{PromotionOutcome, RuleStats, RulesEngine};
pub use type_mapper::{TypeMapper, TypeMapperMatch};
