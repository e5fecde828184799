//! OpenRouter adapter: one HTTP chat-completion call per attempt.
//!
//! Retry/backoff policy lives in the core pipeline; this crate only maps one
//! request to one `POST {base_url}/chat/completions` and classifies the
//! outcome (reply, rate limit, other upstream failure).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use otb_core::{
    completion::{CompletionClient, CompletionRequest},
    domain::Turn,
    errors::Error,
    Result,
};

// OpenRouter attribution headers (optional, used for app rankings).
const SITE_URL: &str = "https://github.com/openrouter-telegram-bot/otb";
const SITE_NAME: &str = "OpenRouter Telegram Bot";

#[derive(Clone, Debug)]
pub struct OpenRouterClient {
    api_key: String,
    http: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            api_key: api_key.into(),
            http,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", req.base_url.trim_end_matches('/'));
        let body = ChatCompletionBody {
            model: &req.model,
            messages: &req.messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        debug!(model = %req.model, messages = req.messages.len(), "completion request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", SITE_URL)
            .header("X-Title", SITE_NAME)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("request error: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after: parse_retry_after(resp.headers()),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "{status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("malformed response: {e}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if reply.trim().is_empty() {
            return Err(Error::Upstream("empty completion".to_string()));
        }

        Ok(reply)
    }
}

/// `Retry-After` in whole seconds. The HTTP-date form is rare enough on this
/// endpoint that it falls back to the caller's own backoff.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// JSON body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Turn],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}
