use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::UserId,
    store::{RecordStore, PENDING_KEY, WHITELIST_KEY},
    utils::iso_timestamp_utc,
    Result,
};

/// A recorded access request awaiting the owner's decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub requested_at: String,
}

/// Outcome of an access request. `NewlyRequested` tells the caller an owner
/// notification should go out; the gate itself never sends anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessRequest {
    AlreadyAuthorized,
    AlreadyPending,
    NewlyRequested,
}

/// Outcome of an approval. `Approved` tells the caller an access-granted
/// notification should go out; a repeat approval stays silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Approval {
    Approved,
    AlreadyAuthorized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    Denied,
    NotPending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotPresent,
    OwnerProtected,
}

/// Whitelist + pending-request gate.
///
/// Every operation is total: absent ids are no-op outcomes, never errors.
/// The owner is authorized unconditionally and can never be removed; stored
/// whitelists are normalized to contain the owner whenever they are touched.
pub struct AuthGate {
    store: Arc<dyn RecordStore>,
    owner: UserId,
}

impl AuthGate {
    pub fn new(store: Arc<dyn RecordStore>, owner: UserId) -> Self {
        Self { store, owner }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub async fn is_authorized(&self, user: UserId) -> bool {
        if user == self.owner {
            return true;
        }
        let ids = parse_ids(self.store.read(WHITELIST_KEY).await.ok().flatten());
        ids.contains(&user.0)
    }

    /// Records a pending request unless the user is already authorized or
    /// already waiting. A duplicate request keeps the original entry (and its
    /// original timestamp).
    pub async fn request_access(
        &self,
        user: UserId,
        username: Option<&str>,
        first_name: &str,
    ) -> Result<AccessRequest> {
        if self.is_authorized(user).await {
            return Ok(AccessRequest::AlreadyAuthorized);
        }

        let entry = PendingRequest {
            username: username.unwrap_or(first_name).to_string(),
            first_name: first_name.to_string(),
            requested_at: iso_timestamp_utc(),
        };
        let key = user.0.to_string();
        let updated = self
            .store
            .update(
                PENDING_KEY,
                Box::new(move |prev| {
                    let mut pending = parse_pending(prev);
                    pending.entry(key).or_insert(entry);
                    serde_json::to_value(&pending).ok()
                }),
            )
            .await?;

        let was_pending = parse_pending(updated.previous).contains_key(&user.0.to_string());
        Ok(if was_pending {
            AccessRequest::AlreadyPending
        } else {
            AccessRequest::NewlyRequested
        })
    }

    /// Idempotent: whitelists the user if absent and clears any pending entry
    /// either way, so an id is never both whitelisted and pending.
    pub async fn approve(&self, user: UserId) -> Result<Approval> {
        let uid = user.0;
        let owner = self.owner.0;
        let updated = self
            .store
            .update(
                WHITELIST_KEY,
                Box::new(move |prev| {
                    let mut ids = with_owner(parse_ids(prev), owner);
                    if !ids.contains(&uid) {
                        ids.push(uid);
                    }
                    serde_json::to_value(&ids).ok()
                }),
            )
            .await?;
        self.remove_pending(user).await?;

        let was_authorized = user == self.owner || parse_ids(updated.previous).contains(&uid);
        Ok(if was_authorized {
            Approval::AlreadyAuthorized
        } else {
            Approval::Approved
        })
    }

    /// Idempotent: drops the pending entry only; the whitelist is untouched.
    pub async fn deny(&self, user: UserId) -> Result<Denial> {
        let removed = self.remove_pending(user).await?;
        Ok(if removed {
            Denial::Denied
        } else {
            Denial::NotPending
        })
    }

    pub async fn remove(&self, user: UserId) -> Result<Removal> {
        if user == self.owner {
            return Ok(Removal::OwnerProtected);
        }
        let uid = user.0;
        let owner = self.owner.0;
        let updated = self
            .store
            .update(
                WHITELIST_KEY,
                Box::new(move |prev| {
                    let mut ids = with_owner(parse_ids(prev), owner);
                    ids.retain(|id| *id != uid);
                    serde_json::to_value(&ids).ok()
                }),
            )
            .await?;

        let was_present = parse_ids(updated.previous).contains(&uid);
        Ok(if was_present {
            Removal::Removed
        } else {
            Removal::NotPresent
        })
    }

    pub async fn whitelist(&self) -> Vec<UserId> {
        let ids = with_owner(
            parse_ids(self.store.read(WHITELIST_KEY).await.ok().flatten()),
            self.owner.0,
        );
        ids.into_iter().map(UserId).collect()
    }

    pub async fn pending(&self) -> Vec<(UserId, PendingRequest)> {
        parse_pending(self.store.read(PENDING_KEY).await.ok().flatten())
            .into_iter()
            .filter_map(|(k, v)| k.parse::<i64>().ok().map(|id| (UserId(id), v)))
            .collect()
    }

    async fn remove_pending(&self, user: UserId) -> Result<bool> {
        let key = user.0.to_string();
        let updated = self
            .store
            .update(
                PENDING_KEY,
                Box::new(move |prev| {
                    let mut pending = parse_pending(prev);
                    pending.remove(&key);
                    serde_json::to_value(&pending).ok()
                }),
            )
            .await?;
        Ok(parse_pending(updated.previous).contains_key(&user.0.to_string()))
    }
}

fn parse_ids(v: Option<Value>) -> Vec<i64> {
    v.and_then(|v| serde_json::from_value::<Vec<i64>>(v).ok())
        .unwrap_or_default()
}

fn with_owner(mut ids: Vec<i64>, owner: i64) -> Vec<i64> {
    if !ids.contains(&owner) {
        ids.insert(0, owner);
    }
    ids
}

fn parse_pending(v: Option<Value>) -> BTreeMap<String, PendingRequest> {
    v.and_then(|v| serde_json::from_value::<BTreeMap<String, PendingRequest>>(v).ok())
        .unwrap_or_default()
}
