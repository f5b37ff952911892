//! Redis-backed shared store (optional).
//!
//! TTL expiry, conditional writes and key enumeration map directly onto
//! Redis primitives: `SET EX`/`PERSIST`, `WATCH`+`MULTI` transactions and
//! `SCAN MATCH`. One logical operation per store call, no client-side locks.

use redis::Commands;

use vendra_core::{Remaining, Ttl};

use crate::contract::{SharedStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: impl AsRef<str>) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    fn conn(&self) -> StoreResult<redis::Connection> {
        self.client
            .get_connection()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn store_err(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl SharedStore for RedisStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.conn()?.get(key).map_err(store_err)
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) -> StoreResult<()> {
        let mut conn = self.conn()?;
        match ttl {
            Ttl::Secs(secs) => conn.set_ex(key, value, secs).map_err(store_err),
            Ttl::Forever => conn.set(key, value).map_err(store_err),
        }
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        next: Option<(&str, Ttl)>,
    ) -> StoreResult<bool> {
        let mut conn = self.conn()?;

        redis::transaction(&mut conn, &[key], |conn, pipe| {
            let current: Option<String> = conn.get(key)?;
            if current.as_deref() != expected {
                redis::cmd("UNWATCH").query::<()>(conn)?;
                return Ok(Some(false));
            }

            match next {
                Some((value, Ttl::Secs(secs))) => {
                    pipe.set_ex(key, value, secs).ignore();
                }
                Some((value, Ttl::Forever)) => {
                    pipe.set(key, value).ignore();
                }
                None => {
                    pipe.del(key).ignore();
                }
            }

            // `None` here means the watched key changed; the helper retries.
            let executed: Option<()> = pipe.query(conn)?;
            Ok(executed.map(|()| true))
        })
        .map_err(store_err)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.conn()?.del(key).map_err(store_err)
    }

    fn remaining(&self, key: &str) -> StoreResult<Remaining> {
        let secs: i64 = self.conn()?.ttl(key).map_err(store_err)?;
        Ok(Remaining::from(secs))
    }

    fn expire(&self, key: &str, ttl: Ttl) -> StoreResult<()> {
        let mut conn = self.conn()?;
        match ttl {
            Ttl::Secs(secs) => conn
                .expire::<_, bool>(key, secs as i64)
                .map(|_| ())
                .map_err(store_err),
            Ttl::Forever => conn.persist::<_, bool>(key).map(|_| ()).map_err(store_err),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn()?;
        let keys = conn
            .scan_match::<_, String>(format!("{prefix}*"))
            .map_err(store_err)?
            .collect();
        Ok(keys)
    }
}
