use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::UserId, errors::Error, Result};

/// Typed configuration for the bot process.
///
/// Everything here comes from the environment (with `.env` support). The
/// mutable bot settings (endpoint base URL, model, language) live in the
/// record store instead, handled by `settings::SettingsStore`; the API
/// credential stays out of that document.
#[derive(Clone, Debug)]
pub struct Config {
    // Required
    pub telegram_bot_token: String,
    pub openrouter_api_key: String,
    pub owner_id: UserId,

    // Storage
    pub data_dir: PathBuf,
    pub system_prompt_path: PathBuf,

    // History / outbound replies
    pub max_history: usize,
    pub telegram_safe_limit: usize,

    // Upstream completion behavior
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars, checked before anything touches the filesystem
        // so a misconfigured process exits without side effects.
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;
        let openrouter_api_key = env_str("OPENROUTER_API_KEY")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("OPENROUTER_API_KEY environment variable is required".to_string())
            })?;
        let owner_id = env_i64("TELEGRAM_OWNER_ID").map(UserId).ok_or_else(|| {
            Error::Config(
                "TELEGRAM_OWNER_ID environment variable is required (numeric user id)".to_string(),
            )
        })?;

        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        let system_prompt_path =
            env_path("SYSTEM_PROMPT_FILE").unwrap_or_else(|| PathBuf::from("system-prompt.txt"));

        let max_history = env_usize("MAX_HISTORY_MESSAGES").unwrap_or(20);
        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000);

        // At least one attempt, whatever the env says.
        let max_attempts = env_u32("COMPLETION_MAX_RETRIES").unwrap_or(3).max(1);
        let backoff_base =
            Duration::from_millis(env_u64("COMPLETION_BASE_DELAY_MS").unwrap_or(1000));
        let upstream_timeout =
            Duration::from_secs(env_u64("COMPLETION_TIMEOUT_SECS").unwrap_or(60));

        Ok(Self {
            telegram_bot_token,
            openrouter_api_key,
            owner_id,
            data_dir,
            system_prompt_path,
            max_history,
            telegram_safe_limit,
            max_attempts,
            backoff_base,
            upstream_timeout,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
