use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Turn, UserId},
    store::{history_key, RecordStore},
    utils::iso_timestamp_utc,
    Result,
};

/// Persisted per-user conversation document. Field names match the JSON files
/// the bot has always written, so existing data keeps loading.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct HistoryDoc {
    user_id: i64,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    last_updated: String,
    #[serde(default)]
    messages: Vec<Turn>,
}

/// Bounded per-user conversation history.
///
/// Mutated only on successful exchanges (the chat pipeline appends the user
/// and assistant turns together); a failed exchange never touches it.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn RecordStore>,
    max_turns: usize,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn RecordStore>, max_turns: usize) -> Self {
        Self { store, max_turns }
    }

    /// Returns the stored turns and display name. A missing or corrupt record
    /// reads as first-use (empty, no name).
    pub async fn load(&self, user: UserId) -> (Vec<Turn>, Option<String>) {
        let doc = match self.store.read(&history_key(user.0)).await {
            Ok(Some(v)) => serde_json::from_value::<HistoryDoc>(v).ok(),
            _ => None,
        };
        match doc {
            Some(d) => {
                let name = if d.user_name.is_empty() {
                    None
                } else {
                    Some(d.user_name)
                };
                (d.messages, name)
            }
            None => (Vec::new(), None),
        }
    }

    /// Appends turns and truncates to the most recent `max_turns` (oldest
    /// dropped first), as one atomic read-modify-write on the user's record.
    pub async fn append(&self, user: UserId, new_turns: &[Turn], display_name: &str) -> Result<()> {
        let new_turns = new_turns.to_vec();
        let display_name = display_name.to_string();
        let max_turns = self.max_turns;
        let user_id = user.0;
        self.store
            .update(
                &history_key(user_id),
                Box::new(move |prev| {
                    let mut messages = prev
                        .and_then(|v| serde_json::from_value::<HistoryDoc>(v).ok())
                        .map(|d| d.messages)
                        .unwrap_or_default();
                    messages.extend(new_turns);
                    if messages.len() > max_turns {
                        let excess = messages.len() - max_turns;
                        messages.drain(..excess);
                    }
                    let doc = HistoryDoc {
                        user_id,
                        user_name: display_name,
                        last_updated: iso_timestamp_utc(),
                        messages,
                    };
                    serde_json::to_value(&doc).ok()
                }),
            )
            .await?;
        Ok(())
    }

    /// Deletes the record entirely; the next `load` behaves as first use.
    pub async fn clear(&self, user: UserId) -> Result<()> {
        self.store.remove(&history_key(user.0)).await
    }

    /// Number of stored turns (shown in menus and status).
    pub async fn turn_count(&self, user: UserId) -> usize {
        self.load(user).await.0.len()
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

    fn exchange(i: usize) -> Vec<Turn> {
        vec![
            Turn::user(format!("q{i}")),
            Turn::assistant(format!("a{i}")),
        ]
    }

    #[tokio::test]
    async fn missing_record_loads_as_first_use() {
        let h = HistoryStore::new(tmp_store("otb-history-missing"), 20);
        let (turns, name) = h.load(UserId(1)).await;
        assert!(turns.is_empty());
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let h = HistoryStore::new(tmp_store("otb-history-rt"), 20);
        let u = UserId(7);
        h.append(u, &exchange(0), "Dana").await.unwrap();
        let (turns, name) = h.load(u).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("q0"));
        assert_eq!(turns[1], Turn::assistant("a0"));
        assert_eq!(name.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn cap_drops_oldest_first_and_keeps_order() {
        let h = HistoryStore::new(tmp_store("otb-history-cap"), 4);
        let u = UserId(7);
        for i in 0..4 {
            h.append(u, &exchange(i), "Dana").await.unwrap();
        }
        let (turns, _) = h.load(u).await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].content, "q2");
        assert_eq!(turns[1].content, "a2");
        assert_eq!(turns[2].content, "q3");
        assert_eq!(turns[3].content, "a3");
    }

    #[tokio::test]
    async fn corrupt_record_is_treated_as_empty() {
        let store = tmp_store("otb-history-corrupt");
        store
            .write(&history_key(9), &serde_json::json!({"messages": "not-a-list"}))
            .await
            .unwrap();
        let h = HistoryStore::new(store, 20);
        let (turns, _) = h.load(UserId(9)).await;
        assert!(turns.is_empty());

        // Appending on top of corruption starts a fresh document.
        h.append(UserId(9), &exchange(1), "Sam").await.unwrap();
        assert_eq!(h.turn_count(UserId(9)).await, 2);
    }

    #[tokio::test]
    async fn clear_resets_to_first_use() {
        let h = HistoryStore::new(tmp_store("otb-history-clear"), 20);
        let u = UserId(3);
        h.append(u, &exchange(0), "Kim").await.unwrap();
        h.clear(u).await.unwrap();
        let (turns, name) = h.load(u).await;
        assert!(turns.is_empty());
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn document_shape_matches_the_legacy_files() {
        let store = tmp_store("otb-history-shape");
        let h = HistoryStore::new(store.clone(), 20);
        h.append(UserId(11), &exchange(0), "Ana").await.unwrap();

        let raw = store.read(&history_key(11)).await.unwrap().unwrap();
        assert_eq!(raw["user_id"], 11);
        assert_eq!(raw["user_name"], "Ana");
        assert_eq!(raw["messages"][0]["role"], "user");
        assert_eq!(raw["messages"][1]["role"], "assistant");
        let ts = raw["last_updated"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
