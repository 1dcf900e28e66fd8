//! External collaborators the core speaks to but does not own (spec.md
//! §6): the mail provider and the LLM. Both are traits so the coordinator
//! can be exercised against fakes in tests without touching a network.

use crate::model::RawMessage;

/// Supplies raw messages. The core owns parsing, dedup, and validation;
/// the adapter owns auth, pagination, and rate limits against the
/// underlying provider.
pub trait MailProviderAdapter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opaque message ids available to fetch, in provider order.
    fn list_ids(&self, max: usize) -> Result<Vec<String>, Self::Error>;

    /// Fetches one message by id. Returns `Ok(None)` if the id no longer
    /// resolves (e.g. deleted between `list_ids` and `get_message`).
    fn get_message(&self, id: &str) -> Result<Option<RawMessage>, Self::Error>;
}

/// A single text-completion call. The core owns timeout enforcement,
/// JSON extraction, and schema validation (C6); the adapter owns auth,
/// quota, and the wire protocol to the underlying model.
///
/// `'static` is required so [`crate::classification::llm::LlmClassifier`]
/// can hand a call off to a detached background thread and enforce its
/// own timeout rather than trusting the adapter/SDK to respect one.
pub trait LlmAdapter: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        top_p: f32,
        max_output_tokens: u32,
    ) -> Result<String, Self::Error>;

    /// Classifies an error from [`generate`] as permanent (4xx/auth/schema
    /// — never retried) or transient (5xx/timeout/network — retried under
    /// policy). Defaults to transient; adapters that can tell the
    /// difference (e.g. from an HTTP status code) should override this.
    fn is_permanent(&self, _error: &Self::Error) -> bool {
        false
    }
}

/// Adapter used by tests and `test_mode` (spec.md §9, `FeatureGates`):
/// returns deterministic canned output instead of calling a model.
pub struct CannedLlmAdapter {
    pub response: String,
}

#[derive(Debug, thiserror::Error)]
#[error("canned adapter never fails")]
pub struct Infallible;

impl LlmAdapter for CannedLlmAdapter {
    type Error = Infallible;

    fn generate(&self, _prompt: &str, _temperature: f32, _top_p: f32, _max_output_tokens: u32) -> Result<String, Self::Error> {
        Ok(self.response.clone())
    }
}

/// In-memory mail provider for tests: a fixed, ordered list of messages.
pub struct FixtureMailAdapter {
    messages: Vec<RawMessage>,
}

impl FixtureMailAdapter {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        FixtureMailAdapter { messages }
    }
}

impl MailProviderAdapter for FixtureMailAdapter {
    type Error = Infallible;

    fn list_ids(&self, max: usize) -> Result<Vec<String>, Self::Error> {
        Ok(self
            .messages
            .iter()
            .take(max)
            .map(|m| m.message_id.clone())
            .collect())
    }

    fn get_message(&self, id: &str) -> Result<Option<RawMessage>, Self::Error> {
        Ok(self.messages.iter().find(|m| m.message_id == id).cloned())
    }
}
