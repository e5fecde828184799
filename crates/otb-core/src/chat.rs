use std::{fs, path::Path, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    completion::{CompletionClient, CompletionRequest},
    config::Config,
    domain::{Turn, UserId},
    errors::Error,
    history::HistoryStore,
    language,
    settings::{BotSettings, SettingsStore},
    Result,
};

/// Seeded into the system prompt file on first use; the file can be edited
/// live since it is re-read on every exchange.
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer clearly and stay on topic.";

/// One chat exchange end to end: settings refresh, language tracking, history
/// assembly, delivery with retries, persistence of the successful result.
pub struct ChatPipeline {
    cfg: Arc<Config>,
    settings: SettingsStore,
    history: HistoryStore,
    completion: Arc<dyn CompletionClient>,
}

impl ChatPipeline {
    pub fn new(
        cfg: Arc<Config>,
        settings: SettingsStore,
        history: HistoryStore,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            cfg,
            settings,
            history,
            completion,
        }
    }

    /// Runs one full exchange and returns the reply text.
    ///
    /// Upstream trouble never surfaces as `Err`: after the last attempt the
    /// error text itself becomes the reply, and history stays untouched.
    /// Only history persistence failures propagate.
    pub async fn run_exchange(
        &self,
        user: UserId,
        display_name: &str,
        input: &str,
    ) -> Result<String> {
        let mut settings = self.settings.load().await;
        self.track_language(&mut settings, input).await;

        let (turns, _) = self.history.load(user).await;
        let mut messages = Vec::with_capacity(turns.len() + 2);
        messages.push(Turn::system(self.system_prompt(&settings)));
        messages.extend(turns);
        messages.push(Turn::user(input));

        let req = CompletionRequest::new(&settings.base_url, &settings.model, messages);

        match self.attempt_with_retries(&req).await {
            Ok(reply) => {
                self.history
                    .append(
                        user,
                        &[Turn::user(input), Turn::assistant(reply.as_str())],
                        display_name,
                    )
                    .await?;
                Ok(reply)
            }
            Err(e) => Ok(format!("❌ API Error: {e}")),
        }
    }

    /// Best-effort: a changed detection updates the settings (and the request
    /// built right after it), but never blocks the exchange.
    async fn track_language(&self, settings: &mut BotSettings, input: &str) {
        let Some(detected) = language::detect(input) else {
            return;
        };
        if detected == settings.language {
            return;
        }
        debug!(from = %settings.language, to = %detected, "language preference changed");
        settings.language = detected;
        if let Err(e) = self.settings.save(settings).await {
            warn!(error = %e, "failed to persist language preference");
        }
    }

    fn system_prompt(&self, settings: &BotSettings) -> String {
        let base = read_or_seed_prompt(&self.cfg.system_prompt_path);
        format!(
            "{base}\n\nPreferred reply language: {}.",
            settings.language
        )
    }

    async fn attempt_with_retries(&self, req: &CompletionRequest) -> Result<String> {
        let max_attempts = self.cfg.max_attempts;
        let mut last_err = Error::Upstream("no attempts were made".to_string());

        for attempt in 0..max_attempts {
            match self.completion.complete(req).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    let delay = match &e {
                        Error::RateLimited { retry_after } => retry_after
                            .unwrap_or_else(|| backoff_delay(self.cfg.backoff_base, attempt)),
                        _ => backoff_delay(self.cfg.backoff_base, attempt),
                    };
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "completion attempt failed"
                    );
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn read_or_seed_prompt(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(_) => {
            if let Err(e) = fs::write(path, DEFAULT_SYSTEM_PROMPT) {
                warn!(path = %path.display(), error = %e, "could not seed system prompt file");
            }
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Role,
        language::Language,
        store::{JsonFileStore, RecordStore, SETTINGS_KEY},
    };
    use async_trait::async_trait;
    use std::{
        collections::VecDeque,
        path::PathBuf,
        sync::Mutex,
    };

    struct FakeCompletion {
        script: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeCompletion {
        fn new(script: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_request(&self) -> CompletionRequest {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, req: &CompletionRequest) -> Result<String> {
            self.calls.lock().unwrap().push(req.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()))
        }
    }

    struct Fixture {
        pipeline: ChatPipeline,
        history: HistoryStore,
        settings: SettingsStore,
        store: Arc<dyn RecordStore>,
        fake: Arc<FakeCompletion>,
    }

    fn fixture(prefix: &str, script: Vec<Result<String>>) -> Fixture {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{}-{ts}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let cfg = Arc::new(Config {
            telegram_bot_token: "token".to_string(),
            openrouter_api_key: "key".to_string(),
            owner_id: UserId(1),
            data_dir: dir.clone(),
            system_prompt_path: dir.join("prompt.txt"),
            max_history: 20,
            telegram_safe_limit: 4000,
            max_attempts: 3,
            backoff_base: Duration::ZERO, // keep retry tests fast
            upstream_timeout: Duration::from_secs(5),
        });
        let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(dir).unwrap());
        let settings = SettingsStore::new(store.clone());
        let history = HistoryStore::new(store.clone(), cfg.max_history);
        let fake = FakeCompletion::new(script);
        let pipeline = ChatPipeline::new(
            cfg,
            settings.clone(),
            history.clone(),
            fake.clone() as Arc<dyn CompletionClient>,
        );
        Fixture {
            pipeline,
            history,
            settings,
            store,
            fake,
        }
    }

    #[tokio::test]
    async fn successful_exchange_appends_both_turns() {
        let fx = fixture("otb-chat-ok", vec![Ok("hello there".to_string())]);
        let user = UserId(7);

        let reply = fx.pipeline.run_exchange(user, "Dana", "hi").await.unwrap();
        assert_eq!(reply, "hello there");
        assert_eq!(fx.fake.call_count(), 1);

        let (turns, name) = fx.history.load(user).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("hi"));
        assert_eq!(turns[1], Turn::assistant("hello there"));
        assert_eq!(name.as_deref(), Some("Dana"));

        let req = fx.fake.last_request();
        assert_eq!(req.messages.first().unwrap().role, Role::System);
        assert_eq!(req.messages.last().unwrap(), &Turn::user("hi"));
        assert_eq!(req.max_tokens, 2000);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_sentinel_and_leave_history_alone() {
        let fx = fixture(
            "otb-chat-fail",
            vec![
                Err(Error::Upstream("boom 1".to_string())),
                Err(Error::Upstream("boom 2".to_string())),
                Err(Error::Upstream("boom 3".to_string())),
            ],
        );
        let user = UserId(7);
        fx.history
            .append(user, &[Turn::user("old q"), Turn::assistant("old a")], "Dana")
            .await
            .unwrap();
        let before = fx.history.load(user).await;

        let reply = fx
            .pipeline
            .run_exchange(user, "Dana", "does this work?")
            .await
            .unwrap();
        assert!(reply.starts_with("❌ API Error:"));
        assert!(reply.contains("boom 3"));
        assert_eq!(fx.fake.call_count(), 3);
        assert_eq!(fx.history.load(user).await, before);
    }

    #[tokio::test]
    async fn rate_limit_consumes_attempts_but_can_recover() {
        let fx = fixture(
            "otb-chat-429",
            vec![
                Err(Error::RateLimited {
                    retry_after: Some(Duration::ZERO),
                }),
                Err(Error::RateLimited { retry_after: None }),
                Ok("made it".to_string()),
            ],
        );
        let user = UserId(9);

        let reply = fx.pipeline.run_exchange(user, "Kim", "ping").await.unwrap();
        assert_eq!(reply, "made it");
        assert_eq!(fx.fake.call_count(), 3);
        assert_eq!(fx.history.turn_count(user).await, 2);
    }

    #[tokio::test]
    async fn language_change_applies_to_the_triggering_message() {
        let fx = fixture("otb-chat-lang", vec![Ok("مرحبا".to_string())]);
        let user = UserId(5);

        fx.pipeline
            .run_exchange(
                user,
                "Ali",
                "مرحبا، كيف حالك اليوم؟ أريد أن أسألك عن حالة الطقس في المدينة هذا الأسبوع وهل ستكون السماء صافية",
            )
            .await
            .unwrap();

        // Persisted for later exchanges...
        assert_eq!(fx.settings.load().await.language, Language::Arabic);
        // ...and already part of the request that carried this message.
        let system = fx.fake.last_request().messages[0].content.clone();
        assert!(system.contains("Arabic"));
    }

    #[tokio::test]
    async fn unchanged_language_is_not_rewritten() {
        let fx = fixture("otb-chat-nolang", vec![Ok("hi".to_string())]);

        // English input against the English default: nothing to update, so
        // the settings document is never created.
        fx.pipeline
            .run_exchange(
                UserId(3),
                "Lee",
                "hello there, how are you doing today? I would like to know whether it will rain later this week",
            )
            .await
            .unwrap();

        assert_eq!(fx.settings.load().await.language, Language::English);
        assert!(fx.store.read(SETTINGS_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prior_history_is_sent_in_order() {
        let fx = fixture("otb-chat-order", vec![Ok("a1".to_string())]);
        let user = UserId(4);
        fx.history
            .append(user, &[Turn::user("q0"), Turn::assistant("a0")], "Sam")
            .await
            .unwrap();

        fx.pipeline.run_exchange(user, "Sam", "q1").await.unwrap();

        let msgs = fx.fake.last_request().messages;
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1], Turn::user("q0"));
        assert_eq!(msgs[2], Turn::assistant("a0"));
        assert_eq!(msgs[3], Turn::user("q1"));
    }

    #[tokio::test]
    async fn system_prompt_file_is_seeded_and_respected() {
        let fx = fixture("otb-chat-prompt", vec![Ok("x".to_string()), Ok("y".to_string())]);
        let user = UserId(2);

        fx.pipeline.run_exchange(user, "Lee", "hello").await.unwrap();
        let path = fx.pipeline.cfg.system_prompt_path.clone();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_SYSTEM_PROMPT);

        std::fs::write(&path, "You are Rex, a terse assistant.").unwrap();
        fx.pipeline.run_exchange(user, "Lee", "hello again").await.unwrap();
        let system = fx.fake.last_request().messages[0].content.clone();
        assert!(system.starts_with("You are Rex"));
    }
}
