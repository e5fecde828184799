use std::time::Duration;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the core can
/// handle failures consistently (fatal vs retryable vs user-facing message).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream asked us to slow down (HTTP 429). The hint, when present,
    /// comes from the `Retry-After` header.
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// Completion endpoint failure other than a rate limit: transport error,
    /// non-2xx status, malformed response body.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
