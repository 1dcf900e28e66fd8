//! Configuration sources (spec.md §6 / §9): environment variables read
//! once at startup, plus live-toggleable feature gates. No component
//! reads the environment directly at runtime except this module — see
//! §9, "Global mutable test_mode / feedback_disabled flags → a Config
//! record threaded through construction".

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

/// Live-toggleable runtime flags, swapped atomically as a whole (never
/// partially mutated in place).
#[derive(Debug, Clone, Default)]
pub struct FeatureGates {
    /// Routes around the LLM adapter with deterministic canned output;
    /// used by tests and CI.
    pub test_mode: bool,
    /// Renders both the plain-text and HTML digest instead of text-only.
    pub hybrid_renderer: bool,
}

/// Assembled once at construction from environment variables and passed
/// by reference to every component that needs it. Mandatory version
/// metadata for the LLM classifier lives here so every Classification it
/// emits can carry it (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub model_name: String,
    pub model_version: String,
    pub prompt_version: String,
    pub type_mapper_path: Option<PathBuf>,
    pub pool_size: usize,
    pub worker_pool_size: usize,
    pub learning_min_confidence: f64,
    /// Per-attempt external timeout for the LLM adapter call (spec.md
    /// §4.6/§5: "enforced by an external waiter, not trusting the SDK").
    pub llm_timeout: Duration,
    pub feature_gates: Arc<ArcSwap<FeatureGates>>,
}

impl Config {
    /// Reads `INBOXSYNTH_*` environment variables, falling back to
    /// conservative defaults when unset.
    pub fn from_env() -> Self {
        Config {
            db_path: std::env::var("INBOXSYNTH_DB_PATH").ok().map(PathBuf::from),
            model_name: std::env::var("INBOXSYNTH_MODEL_NAME")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            model_version: std::env::var("INBOXSYNTH_MODEL_VERSION")
                .unwrap_or_else(|_| "001".to_string()),
            prompt_version: std::env::var("INBOXSYNTH_PROMPT_VERSION")
                .unwrap_or_else(|_| "v1".to_string()),
            type_mapper_path: std::env::var("INBOXSYNTH_TYPE_MAPPER_PATH")
                .ok()
                .map(PathBuf::from),
            pool_size: 5,
            worker_pool_size: 4,
            learning_min_confidence: 0.85,
            llm_timeout: std::env::var("INBOXSYNTH_LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_secs(10)),
            feature_gates: Arc::new(ArcSwap::from_pointee(FeatureGates {
                test_mode: std::env::var("INBOXSYNTH_TEST_MODE").as_deref() == Ok("1"),
                hybrid_renderer: std::env::var("INBOXSYNTH_HYBRID_RENDERER").as_deref() == Ok("1"),
            })),
        }
    }

    /// Atomically swap in a new set of feature gates (e.g. a runtime
    /// admin toggle). Never mutates the previous value in place.
    pub fn set_feature_gates(&self, gates: FeatureGates) {
        self.feature_gates.store(Arc::new(gates));
    }

    pub fn feature_gates(&self) -> Arc<FeatureGates> {
        self.feature_gates.load_full()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: None,
            model_name: "gemini-1.5-flash".to_string(),
            model_version: "001".to_string(),
            prompt_version: "v1".to_string(),
            type_mapper_path: None,
            pool_size: 5,
            worker_pool_size: 4,
            learning_min_confidence: 0.85,
            llm_timeout: Duration::from_secs(10),
            feature_gates: Arc::new(ArcSwap::from_pointee(FeatureGates::default())),
        }
    }
}
