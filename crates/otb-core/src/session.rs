use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::UserId;

/// Per-user interaction mode. `Idle` is an explicit state; users without an
/// entry read as `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionMode {
    #[default]
    Idle,
    Chat,
    AwaitingModelId,
    AwaitingAddUserId,
    AwaitingRemoveUserId,
}

/// Transient per-user session state. Nothing here survives a restart.
///
/// Besides the mode map, this owns a per-user lock: text handling runs under
/// it, so two messages from the same user cannot interleave mid-flow (the
/// second waits for the first exchange, upstream call included, to finish).
#[derive(Default)]
pub struct SessionStore {
    modes: Mutex<HashMap<i64, SessionMode>>,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mode(&self, user: UserId) -> SessionMode {
        self.modes
            .lock()
            .await
            .get(&user.0)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set_mode(&self, user: UserId, mode: SessionMode) {
        let mut map = self.modes.lock().await;
        if mode == SessionMode::Idle {
            map.remove(&user.0);
        } else {
            map.insert(user.0, mode);
        }
    }

    /// Back to `Idle`; reports whether anything was actually active.
    pub async fn reset(&self, user: UserId) -> bool {
        self.modes.lock().await.remove(&user.0).is_some()
    }

    pub async fn lock_user(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            map.entry(user.0)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
