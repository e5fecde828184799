use async_trait::async_trait;

use crate::{domain::Turn, Result};

/// Fixed request parameters, matching what the bot has always sent.
pub const MAX_TOKENS: u32 = 2000;
pub const TEMPERATURE: f64 = 0.7;

/// One fully assembled chat-completion request.
///
/// `base_url` rides along because it belongs to the mutable settings: the
/// pipeline re-reads settings per exchange, so an edit to the stored document
/// applies to the very next call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub base_url: String,
    pub model: String,
    pub messages: Vec<Turn>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<Turn>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// Port for a single delivery attempt against the completion endpoint.
///
/// Implementations perform exactly one HTTP call; the retry/backoff policy
/// lives in the chat pipeline so it can be tested against fakes. A 429 maps
/// to `Error::RateLimited` (carrying the server's `Retry-After` hint when
/// present); any other transient failure maps to `Error::Upstream`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String>;
}
