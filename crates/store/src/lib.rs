//! `vendra-store` — shared session-state store contract and adapters.
//!
//! Every durable fact the kernel tracks (revocations, device bindings, bans,
//! step-up windows, account sessions) lives behind [`SharedStore`] so that
//! multiple service instances observe the same state. The in-memory adapter
//! is for tests/dev; production uses the Redis adapter (feature `redis`).

pub mod contract;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod search;

pub use contract::{SharedStore, StoreError, StoreResult};
pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisStore;
pub use search::search_keys;
