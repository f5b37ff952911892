use std::sync::Arc;

use thiserror::Error;

use vendra_core::{Remaining, Ttl};

/// Store operation error.
///
/// Store faults always surface to the caller (fail-closed); the kernel never
/// coerces them into "not logged in" booleans. Retry policy belongs to the
/// deployment, not here.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// The backing store could not be reached or answered abnormally.
    #[error("shared store unavailable: {0}")]
    Unavailable(String),

    /// A stored value failed to decode (corrupt or foreign data under a key).
    #[error("corrupt value under key '{key}': {message}")]
    Corrupt { key: String, message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared key-value store with per-key TTL and atomic conditional writes.
///
/// The contract is deliberately small: plain get/set/delete, a single
/// compare-and-swap primitive for every mutation that must be atomic under
/// concurrent access, TTL introspection/renewal, and prefix enumeration for
/// operational key search. Implementations own expiry; an expired key reads
/// as absent.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str, ttl: Ttl) -> StoreResult<()>;

    /// Atomically replace the value under `key` iff its current value equals
    /// `expected` (`None` = key absent). `next = None` deletes the key.
    /// Returns `false` when the precondition failed (no write happened).
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        next: Option<(&str, Ttl)>,
    ) -> StoreResult<bool>;

    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remaining lifetime of `key` (`Forever` for keys without expiry,
    /// `Absent` for missing/expired keys).
    fn remaining(&self, key: &str) -> StoreResult<Remaining>;

    /// Reset the lifetime of an existing key. Missing keys are a no-op.
    fn expire(&self, key: &str, ttl: Ttl) -> StoreResult<()>;

    /// All live keys starting with `prefix`, in no particular order.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

impl<S> SharedStore for Arc<S>
where
    S: SharedStore + ?Sized,
{
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) -> StoreResult<()> {
        (**self).set(key, value, ttl)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        next: Option<(&str, Ttl)>,
    ) -> StoreResult<bool> {
        (**self).compare_and_swap(key, expected, next)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn remaining(&self, key: &str) -> StoreResult<Remaining> {
        (**self).remaining(key)
    }

    fn expire(&self, key: &str, ttl: Ttl) -> StoreResult<()> {
        (**self).expire(key, ttl)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}
