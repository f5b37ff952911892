//! Reverse index from (principal, device type) to live token ids.
//!
//! Answers "who else is logged in" and drives device-scoped eviction. Every
//! mutation goes through the store's compare-and-swap so concurrent logins
//! on different service instances cannot lose bindings.

use std::sync::Arc;

use serde_json::json;

use vendra_core::{LoginId, Remaining, Ttl};
use vendra_store::{SharedStore, StoreError, StoreResult};

use crate::config::BindPolicy;
use crate::keys::Keyspace;
use crate::revocation::{RevocationStore, RevokeReason};

/// Device slot used when a login does not declare one.
pub const DEFAULT_DEVICE: &str = "default";

const CAS_ATTEMPTS: usize = 8;

pub struct DeviceSessionIndex {
    store: Arc<dyn SharedStore>,
    keys: Arc<Keyspace>,
    revocations: Arc<RevocationStore>,
}

impl DeviceSessionIndex {
    pub(crate) fn new(
        store: Arc<dyn SharedStore>,
        keys: Arc<Keyspace>,
        revocations: Arc<RevocationStore>,
    ) -> Self {
        Self {
            store,
            keys,
            revocations,
        }
    }

    /// Record `token_id` as a live session for (login_id, device).
    ///
    /// Under a singleton policy the slot's previous tokens are evicted first:
    /// revoked with the policy's reason and their validity markers dropped.
    /// Returns the evicted token ids.
    pub fn bind(
        &self,
        login_id: &LoginId,
        device: &str,
        token_id: &str,
        token_ttl: Ttl,
        policy: BindPolicy,
    ) -> StoreResult<Vec<String>> {
        let key = self.keys.device(login_id, device);

        for _ in 0..CAS_ATTEMPTS {
            let current = self.store.get(&key)?;
            let mut list = parse_list(&key, current.as_deref())?;

            let evicted: Vec<String> = match policy {
                BindPolicy::Concurrent => {
                    list.retain(|id| id != token_id);
                    Vec::new()
                }
                BindPolicy::SingletonKickout | BindPolicy::SingletonReplace => {
                    std::mem::take(&mut list)
                }
            };
            list.push(token_id.to_string());

            let ttl = self.slot_ttl(&key, token_ttl, policy)?;
            let raw = json!(list).to_string();
            if self
                .store
                .compare_and_swap(&key, current.as_deref(), Some((raw.as_str(), ttl)))?
            {
                let reason = match policy {
                    BindPolicy::SingletonReplace => RevokeReason::Replaced,
                    _ => RevokeReason::Kickout,
                };
                for old in &evicted {
                    self.evict_token(old, reason)?;
                }
                return Ok(evicted);
            }
        }

        Err(StoreError::Unavailable(format!(
            "device binding contention on '{key}'"
        )))
    }

    /// Live token ids for the principal, most-recent-last per device.
    /// `device = None` walks every device slot.
    pub fn list_tokens(&self, login_id: &LoginId, device: Option<&str>) -> StoreResult<Vec<String>> {
        let keys = match device {
            Some(device) => vec![self.keys.device(login_id, device)],
            None => {
                let mut keys = self.store.keys_with_prefix(&self.keys.device_prefix(login_id))?;
                keys.sort();
                keys
            }
        };

        let mut tokens = Vec::new();
        for key in keys {
            let raw = self.store.get(&key)?;
            for id in parse_list(&key, raw.as_deref())? {
                // Entries whose validity marker lapsed are just index debris.
                if !self.store.remaining(&self.keys.token(&id))?.is_absent() {
                    tokens.push(id);
                }
            }
        }
        Ok(tokens)
    }

    /// Most recent live token for the slot, if any.
    pub fn last_token(&self, login_id: &LoginId, device: Option<&str>) -> StoreResult<Option<String>> {
        Ok(self.list_tokens(login_id, device)?.pop())
    }

    /// Evict every binding for the principal (optionally one device type).
    pub fn unbind(
        &self,
        login_id: &LoginId,
        device: Option<&str>,
        reason: RevokeReason,
    ) -> StoreResult<Vec<String>> {
        let keys = match device {
            Some(device) => vec![self.keys.device(login_id, device)],
            None => self.store.keys_with_prefix(&self.keys.device_prefix(login_id))?,
        };

        let mut evicted = Vec::new();
        for key in keys {
            let raw = self.store.get(&key)?;
            for id in parse_list(&key, raw.as_deref())? {
                self.evict_token(&id, reason)?;
                evicted.push(id);
            }
            self.store.delete(&key)?;
        }
        Ok(evicted)
    }

    /// Evict a single token and drop it from its slot's list.
    pub fn unbind_token(
        &self,
        login_id: &LoginId,
        device: &str,
        token_id: &str,
        reason: RevokeReason,
    ) -> StoreResult<()> {
        let key = self.keys.device(login_id, device);

        for _ in 0..CAS_ATTEMPTS {
            let current = self.store.get(&key)?;
            let mut list = parse_list(&key, current.as_deref())?;
            list.retain(|id| id != token_id);

            let next_raw = json!(list).to_string();
            let remaining = self.store.remaining(&key)?;
            let next = match remaining {
                Remaining::Absent => None,
                Remaining::Forever => Some((next_raw.as_str(), Ttl::Forever)),
                Remaining::Secs(s) => Some((next_raw.as_str(), Ttl::Secs(s))),
            };
            let next = if list.is_empty() { None } else { next };

            if self.store.compare_and_swap(&key, current.as_deref(), next)? {
                self.evict_token(token_id, reason)?;
                return Ok(());
            }
        }

        Err(StoreError::Unavailable(format!(
            "device binding contention on '{key}'"
        )))
    }

    /// Extend the slot's lifetime to cover a renewed token.
    pub fn extend_slot(&self, login_id: &LoginId, device: &str, ttl: Ttl) -> StoreResult<()> {
        let key = self.keys.device(login_id, device);
        match (ttl, self.store.remaining(&key)?) {
            (_, Remaining::Absent) => Ok(()),
            (Ttl::Forever, _) => self.store.expire(&key, Ttl::Forever),
            (_, Remaining::Forever) => Ok(()),
            (Ttl::Secs(new), Remaining::Secs(cur)) if new > cur => {
                self.store.expire(&key, Ttl::Secs(new))
            }
            _ => Ok(()),
        }
    }

    fn evict_token(&self, token_id: &str, reason: RevokeReason) -> StoreResult<()> {
        let marker = self.keys.token(token_id);
        match self.store.remaining(&marker)? {
            Remaining::Absent => {}
            Remaining::Forever => self.revocations.revoke(token_id, reason, Ttl::Forever)?,
            Remaining::Secs(s) => self.revocations.revoke(token_id, reason, Ttl::Secs(s))?,
        }
        self.store.delete(&marker)?;
        self.store.delete(&self.keys.active(token_id))?;
        Ok(())
    }

    fn slot_ttl(&self, key: &str, token_ttl: Ttl, policy: BindPolicy) -> StoreResult<Ttl> {
        // Singleton slots hold exactly the new token; concurrent slots must
        // outlive their longest-lived member.
        if !matches!(policy, BindPolicy::Concurrent) || token_ttl.is_forever() {
            return Ok(token_ttl);
        }
        Ok(match (token_ttl, self.store.remaining(key)?) {
            (ttl, Remaining::Absent) => ttl,
            (_, Remaining::Forever) => Ttl::Forever,
            (Ttl::Secs(new), Remaining::Secs(cur)) => Ttl::Secs(new.max(cur)),
            (Ttl::Forever, _) => Ttl::Forever,
        })
    }
}

fn parse_list(key: &str, raw: Option<&str>) -> StoreResult<Vec<String>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
