use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::Result;

/// Keys of the persisted documents (one JSON document per concern).
pub const SETTINGS_KEY: &str = "config";
pub const WHITELIST_KEY: &str = "whitelist";
pub const PENDING_KEY: &str = "pending";

pub fn history_key(user_id: i64) -> String {
    format!("history/{user_id}")
}

/// Closure applied under the per-key lock by [`RecordStore::update`].
/// Returning `None` deletes the record.
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Option<Value> + Send>;

/// Before/after view of an atomic update, so callers can derive idempotent
/// outcomes without a second read.
#[derive(Clone, Debug)]
pub struct Updated {
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

/// Persistent key → JSON-document storage.
///
/// Semantics the rest of the core relies on:
/// - `read` is total in practice: a missing or unparseable record comes back
///   as `Ok(None)` (corruption is logged, then treated as absence).
/// - `update` runs its closure under a per-key lock, giving atomic
///   read-modify-write per key. There are no cross-key transactions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Value>>;
    async fn write(&self, key: &str, value: &Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn update(&self, key: &str, apply: UpdateFn) -> Result<Updated>;
}

/// File-backed store: key `k` lives at `<root>/k.json`. Keys may contain `/`
/// for namespacing (`history/42` → `<root>/history/42.json`).
pub struct JsonFileStore {
    root: PathBuf,
    locks: KeyLocks,
}

#[derive(Default)]
struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: KeyLocks::default(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    async fn read_unlocked(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(key, error = %e, "record unreadable, treating as absent");
                return Ok(None);
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(key, error = %e, "record corrupt, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write_unlocked(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn remove_unlocked(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.locks.lock_key(key).await;
        self.read_unlocked(key).await
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        let _guard = self.locks.lock_key(key).await;
        self.write_unlocked(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.locks.lock_key(key).await;
        self.remove_unlocked(key).await
    }

    async fn update(&self, key: &str, apply: UpdateFn) -> Result<Updated> {
        let _guard = self.locks.lock_key(key).await;
        let previous = self.read_unlocked(key).await?;
        let current = apply(previous.clone());
        match &current {
            Some(v) => self.write_unlocked(key, v).await?,
            None => self.remove_unlocked(key).await?,
        }
        Ok(Updated { previous, current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    #[tokio::test]
    async fn read_missing_is_none() {
        let store = JsonFileStore::new(tmp_dir("otb-store-missing")).unwrap();
        assert!(store.read("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let store = JsonFileStore::new(tmp_dir("otb-store-rw")).unwrap();
        let v = serde_json::json!({"a": 1});
        store.write("doc", &v).await.unwrap();
        assert_eq!(store.read("doc").await.unwrap(), Some(v));
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_absent() {
        let dir = tmp_dir("otb-store-corrupt");
        let store = JsonFileStore::new(dir.clone()).unwrap();
        std::fs::write(dir.join("bad.json"), "{not json").unwrap();
        assert!(store.read("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn namespaced_keys_create_subdirectories() {
        let dir = tmp_dir("otb-store-ns");
        let store = JsonFileStore::new(dir.clone()).unwrap();
        store
            .write(&history_key(42), &serde_json::json!([]))
            .await
            .unwrap();
        assert!(dir.join("history/42.json").is_file());
    }

    #[tokio::test]
    async fn update_sees_previous_and_persists_current() {
        let store = JsonFileStore::new(tmp_dir("otb-store-update")).unwrap();
        store.write("n", &serde_json::json!(1)).await.unwrap();
        let out = store
            .update(
                "n",
                Box::new(|prev| {
                    let n = prev.and_then(|v| v.as_i64()).unwrap_or(0);
                    Some(serde_json::json!(n + 1))
                }),
            )
            .await
            .unwrap();
        assert_eq!(out.previous, Some(serde_json::json!(1)));
        assert_eq!(out.current, Some(serde_json::json!(2)));
        assert_eq!(store.read("n").await.unwrap(), Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn update_returning_none_removes_the_record() {
        let store = JsonFileStore::new(tmp_dir("otb-store-del")).unwrap();
        store.write("gone", &serde_json::json!(true)).await.unwrap();
        store.update("gone", Box::new(|_| None)).await.unwrap();
        assert!(store.read("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_missing_is_a_noop() {
        let store = JsonFileStore::new(tmp_dir("otb-store-rm")).unwrap();
        store.remove("never-written").await.unwrap();
    }
}
