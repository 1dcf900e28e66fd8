//! # inboxsynth-core
//!
//! Classifies inbox email and synthesizes a sectioned digest:
//!
//! - **Storage**: a single embedded SQLite store behind a bounded
//!   connection pool with lock-retrying scoped acquisitions.
//! - **Classification cascade**: deterministic type mapper → user-learned
//!   rules engine → LLM classifier, with schema validation and a safe
//!   fallback on repeated failure.
//! - **Guardrails**: policy overrides (`never_surface`, `force_critical`,
//!   `force_non_critical`) applied after the cascade, before synthesis.
//! - **Entity extraction**: fixed-order rule-based extractors for
//!   flights, events, deadlines, reminders, promos, and notifications.
//! - **Temporal decay**: resolves an entity's stored importance into a
//!   digest-time importance based on now-relative windows.
//! - **Timeline synthesis**: sections classified email into CRITICAL,
//!   TODAY, COMING UP, WORTH KNOWING, and EVERYTHING ELSE.
//! - **Pipeline coordinator**: sequences all of the above over one batch,
//!   with a bounded worker pool for parsing and classification.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use inboxsynth_core::{Config, Pool};
//! use inboxsynth_core::classification::{Cascade, LlmClassifier, TypeMapper};
//! use inboxsynth_core::pipeline::{NeverCancel, PipelineCoordinator};
//! use inboxsynth_core::telemetry::TracingSink;
//! use std::sync::Arc;
//!
//! let config = Config::from_env();
//! let pool = Pool::open(config.db_path.as_deref().unwrap(), config.pool_size)?;
//! let telemetry = Arc::new(TracingSink);
//! let llm = LlmClassifier::new(my_adapter, config.clone(), telemetry.clone());
//! let cascade = Cascade::new(&pool, TypeMapper::load(config.type_mapper_path.as_deref()), llm);
//! let coordinator = PipelineCoordinator::new(&pool, cascade, config, telemetry);
//! let digest = coordinator.run_batch(&mail_adapter, "user-1", 100, chrono::Utc::now(), true, &NeverCancel)?;
//! # Ok::<(), inboxsynth_core::error::Error>(())
//! ```

pub mod adapters;
pub mod classification;
pub mod config;
pub mod entities;
pub mod error;
pub mod feedback;
pub mod guardrails;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod temporal;
pub mod timeline;

pub use config::{Config, FeatureGates};
pub use error::Error;
pub use feedback::FeedbackManager;
pub use guardrails::{GuardrailCategory, GuardrailDecision, GuardrailMatcher};
pub use pipeline::{PipelineCoordinator, Rendering};
pub use storage::{Pool, StorageError};
pub use timeline::TimelineSynthesizer;

/// Crate version, for inclusion in logs and stored `ModelVersion` records.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::adapters::{LlmAdapter, MailProviderAdapter};
    pub use crate::config::{Config, FeatureGates};
    pub use crate::error::Error;
    pub use crate::feedback::FeedbackManager;
    pub use crate::guardrails::GuardrailMatcher;
    pub use crate::model::{Classification, Digest, Entity, ImportanceLevel, ParsedEmail};
    pub use crate::pipeline::{CancelSignal, NeverCancel, PipelineCoordinator};
    pub use crate::storage::Pool;
    pub use crate::telemetry::{TelemetrySink, TracingSink};
    pub use crate::timeline::TimelineSynthesizer;
}
