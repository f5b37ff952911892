//! Store-backed account sessions.
//!
//! A small JSON map per principal, created on demand and shared by every
//! service instance. The admin capability resolver reads its permission
//! codes from here; anything else a deployment wants to pin to a login can
//! live here too. Mutations go through compare-and-swap so concurrent
//! writers merge instead of clobbering.

use std::sync::Arc;

use serde_json::{Map, Value};

use vendra_core::{LoginId, Remaining, Ttl};
use vendra_store::{SharedStore, StoreError, StoreResult};

use crate::keys::Keyspace;

const CAS_ATTEMPTS: usize = 8;

/// Handle to one principal's session map.
pub struct AccountSession {
    store: Arc<dyn SharedStore>,
    key: String,
    ttl: Ttl,
}

impl AccountSession {
    pub(crate) fn new(store: Arc<dyn SharedStore>, keys: &Keyspace, login_id: &LoginId, ttl: Ttl) -> Self {
        Self {
            store,
            key: keys.session(login_id),
            ttl,
        }
    }

    /// Open a session handle without going through a kernel.
    ///
    /// For collaborators (capability resolvers, operational tools) that hold
    /// only the store; `key_prefix`/`login_type` must match the owning
    /// kernel's configuration or the handle points at a foreign namespace.
    pub fn open(
        store: Arc<dyn SharedStore>,
        key_prefix: &str,
        login_type: &vendra_core::LoginType,
        login_id: &LoginId,
        ttl: Ttl,
    ) -> Self {
        Self::new(
            store,
            &Keyspace::new(key_prefix, login_type.as_str()),
            login_id,
            ttl,
        )
    }

    pub fn get(&self, field: &str) -> StoreResult<Option<Value>> {
        Ok(self.read()?.and_then(|mut map| map.remove(field)))
    }

    pub fn set(&self, field: &str, value: Value) -> StoreResult<()> {
        self.update(|map| {
            map.insert(field.to_string(), value.clone());
        })
    }

    pub fn remove(&self, field: &str) -> StoreResult<()> {
        self.update(|map| {
            map.remove(field);
        })
    }

    /// Drop the whole session.
    pub fn clear(&self) -> StoreResult<()> {
        self.store.delete(&self.key)
    }

    pub fn remaining(&self) -> StoreResult<Remaining> {
        self.store.remaining(&self.key)
    }

    fn read(&self) -> StoreResult<Option<Map<String, Value>>> {
        match self.store.get(&self.key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: self.key.clone(),
                    message: e.to_string(),
                }),
        }
    }

    fn update(&self, apply: impl Fn(&mut Map<String, Value>)) -> StoreResult<()> {
        for _ in 0..CAS_ATTEMPTS {
            let current = self.store.get(&self.key)?;
            let mut map = match &current {
                None => Map::new(),
                Some(raw) => serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
                    key: self.key.clone(),
                    message: e.to_string(),
                })?,
            };
            apply(&mut map);

            let raw = Value::Object(map).to_string();
            // A fresh session gets the configured lifetime; an existing one
            // keeps its own.
            let ttl = match self.store.remaining(&self.key)? {
                Remaining::Absent => self.ttl,
                Remaining::Forever => Ttl::Forever,
                Remaining::Secs(s) => Ttl::Secs(s),
            };
            if self
                .store
                .compare_and_swap(&self.key, current.as_deref(), Some((raw.as_str(), ttl)))?
            {
                return Ok(());
            }
        }

        Err(StoreError::Unavailable(format!(
            "session contention on '{}'",
            self.key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> AccountSession {
        let store: Arc<vendra_store::InMemoryStore> = Arc::new(vendra_store::InMemoryStore::new());
        AccountSession::new(
            store,
            &Keyspace::new("vendra", "admin"),
            &LoginId::Int(1),
            Ttl::Secs(3600),
        )
    }

    #[test]
    fn values_round_trip_until_cleared() {
        let session = session();
        session
            .set("permissions", json!(["pms:read", "pms:write"]))
            .unwrap();
        assert_eq!(
            session.get("permissions").unwrap(),
            Some(json!(["pms:read", "pms:write"]))
        );

        session.clear().unwrap();
        assert_eq!(session.get("permissions").unwrap(), None);
    }

    #[test]
    fn remove_deletes_one_field() {
        let session = session();
        session.set("a", json!(1)).unwrap();
        session.set("b", json!(2)).unwrap();
        session.remove("a").unwrap();

        assert_eq!(session.get("a").unwrap(), None);
        assert_eq!(session.get("b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn missing_session_reads_as_empty() {
        let session = session();
        assert_eq!(session.get("anything").unwrap(), None);
        assert!(session.remaining().unwrap().is_absent());
    }
}
