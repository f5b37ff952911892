use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use vendra_core::{Clock, Remaining, SystemClock, Ttl};

use crate::contract::{SharedStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    deadline: Option<DateTime<Utc>>,
}

/// In-memory store with lazy TTL expiry.
///
/// Intended for tests/dev. Expiry is evaluated against the injected clock on
/// every access, so simulated-time tests behave exactly like a TTL-capable
/// backend.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn live<'a>(&self, entry: Option<&'a Entry>, now: DateTime<Utc>) -> Option<&'a Entry> {
        entry.filter(|e| e.deadline.is_none_or(|at| at > now))
    }

    fn lock_err() -> StoreError {
        StoreError::Unavailable("store lock poisoned".to_string())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for InMemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        Ok(self.live(entries.get(key), now).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) -> StoreResult<()> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline: ttl.deadline(now),
            },
        );
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        next: Option<(&str, Ttl)>,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;

        let current = self.live(entries.get(key), now).map(|e| e.value.as_str());
        if current != expected {
            return Ok(false);
        }

        match next {
            Some((value, ttl)) => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        deadline: ttl.deadline(now),
                    },
                );
            }
            None => {
                entries.remove(key);
            }
        }

        Ok(true)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        entries.remove(key);
        Ok(())
    }

    fn remaining(&self, key: &str) -> StoreResult<Remaining> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        Ok(match self.live(entries.get(key), now) {
            Some(entry) => Remaining::until(entry.deadline, now),
            None => Remaining::Absent,
        })
    }

    fn expire(&self, key: &str, ttl: Ttl) -> StoreResult<()> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;

        let live = match entries.get_mut(key) {
            Some(e) if e.deadline.is_none_or(|at| at > now) => e,
            _ => return Ok(()),
        };
        live.deadline = ttl.deadline(now);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.deadline.is_none_or(|at| at > now))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendra_core::ManualClock;

    fn store_with_clock() -> (InMemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (InMemoryStore::with_clock(clock.clone()), clock)
    }

    #[test]
    fn expired_keys_read_as_absent() {
        let (store, clock) = store_with_clock();
        store.set("k", "v", Ttl::Secs(10)).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        clock.advance_secs(11);
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.remaining("k").unwrap().is_absent());
    }

    #[test]
    fn forever_keys_never_expire() {
        let (store, clock) = store_with_clock();
        store.set("k", "v", Ttl::Forever).unwrap();
        clock.advance_secs(1_000_000);
        assert_eq!(store.remaining("k").unwrap(), Remaining::Forever);
    }

    #[test]
    fn cas_requires_matching_current_value() {
        let (store, _clock) = store_with_clock();
        store.set("k", "a", Ttl::Forever).unwrap();

        assert!(!store
            .compare_and_swap("k", Some("b"), Some(("c", Ttl::Forever)))
            .unwrap());
        assert!(store
            .compare_and_swap("k", Some("a"), Some(("c", Ttl::Forever)))
            .unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn cas_on_absent_key_is_create() {
        let (store, clock) = store_with_clock();
        assert!(store
            .compare_and_swap("k", None, Some(("v", Ttl::Secs(5))))
            .unwrap());
        // A live key no longer matches the "absent" precondition.
        assert!(!store
            .compare_and_swap("k", None, Some(("w", Ttl::Secs(5))))
            .unwrap());

        clock.advance_secs(6);
        assert!(store
            .compare_and_swap("k", None, Some(("w", Ttl::Secs(5))))
            .unwrap());
    }

    #[test]
    fn expire_renews_lifetime() {
        let (store, clock) = store_with_clock();
        store.set("k", "v", Ttl::Secs(5)).unwrap();
        clock.advance_secs(4);
        store.expire("k", Ttl::Secs(60)).unwrap();
        clock.advance_secs(50);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn prefix_enumeration_skips_expired() {
        let (store, clock) = store_with_clock();
        store.set("s:a", "1", Ttl::Secs(5)).unwrap();
        store.set("s:b", "2", Ttl::Forever).unwrap();
        store.set("t:c", "3", Ttl::Forever).unwrap();

        clock.advance_secs(6);
        let keys = store.keys_with_prefix("s:").unwrap();
        assert_eq!(keys, vec!["s:b".to_string()]);
    }
}
