use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    language::Language,
    store::{RecordStore, SETTINGS_KEY},
    Result,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1:free";

/// Mutable bot settings, persisted as a single JSON document.
///
/// The completion credential is deliberately not part of this type: it comes
/// from the environment and must never reach the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub language: Language,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language: Language::English,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Load/save wrapper around the settings record.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn RecordStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Settings are re-read on every use, so edits to the stored document
    /// (including a language update made moments ago) apply to the next
    /// exchange. Missing fields backfill from defaults; an unreadable
    /// document is treated as unset.
    pub async fn load(&self) -> BotSettings {
        match self.store.read(SETTINGS_KEY).await {
            Ok(Some(v)) => serde_json::from_value(v).unwrap_or_default(),
            _ => BotSettings::default(),
        }
    }

    pub async fn save(&self, settings: &BotSettings) -> Result<()> {
        let value = serde_json::to_value(settings)?;
        self.store.write(SETTINGS_KEY, &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use std::path::PathBuf;

    fn tmp_store(prefix: &str) -> Arc<dyn RecordStore> {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"));
        Arc::new(JsonFileStore::new(dir).unwrap())
    }

    #[tokio::test]
    async fn defaults_when_unwritten() {
        let settings = SettingsStore::new(tmp_store("otb-settings-default"));
        let s = settings.load().await;
        assert_eq!(s, BotSettings::default());
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.language, Language::English);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let settings = SettingsStore::new(tmp_store("otb-settings-rt"));
        let mut s = BotSettings::default();
        s.model = "mistralai/mistral-small".to_string();
        s.language = Language::Thai;
        settings.save(&s).await.unwrap();
        assert_eq!(settings.load().await, s);
    }

    #[tokio::test]
    async fn partial_documents_backfill_defaults() {
        let store = tmp_store("otb-settings-partial");
        store
            .write(SETTINGS_KEY, &serde_json::json!({"model": "some/model"}))
            .await
            .unwrap();
        let s = SettingsStore::new(store).load().await;
        assert_eq!(s.model, "some/model");
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.language, Language::English);
    }

    #[tokio::test]
    async fn stale_credential_field_never_survives_a_save() {
        let store = tmp_store("otb-settings-cred");
        store
            .write(
                SETTINGS_KEY,
                &serde_json::json!({"api_key": "sk-leaked", "model": "m"}),
            )
            .await
            .unwrap();
        let settings = SettingsStore::new(store.clone());
        let s = settings.load().await;
        settings.save(&s).await.unwrap();
        let raw = store.read(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(raw.get("api_key").is_none());
        assert_eq!(raw.get("model").unwrap(), "m");
    }
}
