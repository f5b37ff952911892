//! Shared revocation records for tokens that must die before their natural
//! expiry.
//!
//! A record's TTL is the token's remaining lifetime, so storage stays
//! bounded: once the token would have expired anyway the record lapses with
//! it. The recorded reason decides what the evicted caller sees — kickout is
//! a distinguished error, replacement and logout are plain
//! not-authenticated.

use std::str::FromStr;
use std::sync::Arc;

use vendra_core::Ttl;
use vendra_store::{SharedStore, StoreError, StoreResult};

use crate::keys::Keyspace;

/// Why a token was revoked.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RevokeReason {
    Logout,
    Kickout,
    Replaced,
}

impl RevokeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevokeReason::Logout => "logout",
            RevokeReason::Kickout => "kickout",
            RevokeReason::Replaced => "replaced",
        }
    }
}

impl FromStr for RevokeReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logout" => Ok(RevokeReason::Logout),
            "kickout" => Ok(RevokeReason::Kickout),
            "replaced" => Ok(RevokeReason::Replaced),
            _ => Err(()),
        }
    }
}

pub struct RevocationStore {
    store: Arc<dyn SharedStore>,
    keys: Arc<Keyspace>,
}

impl RevocationStore {
    pub(crate) fn new(store: Arc<dyn SharedStore>, keys: Arc<Keyspace>) -> Self {
        Self { store, keys }
    }

    /// Mark `token_id` dead for `ttl` (the token's remaining lifetime).
    /// Revoking an already-revoked token is a no-op; the first reason wins.
    pub fn revoke(&self, token_id: &str, reason: RevokeReason, ttl: Ttl) -> StoreResult<()> {
        let key = self.keys.revoked(token_id);
        let _ = self
            .store
            .compare_and_swap(&key, None, Some((reason.as_str(), ttl)))?;
        Ok(())
    }

    pub fn reason(&self, token_id: &str) -> StoreResult<Option<RevokeReason>> {
        let key = self.keys.revoked(token_id);
        match self.store.get(&key)? {
            None => Ok(None),
            Some(raw) => raw
                .parse::<RevokeReason>()
                .map(Some)
                .map_err(|()| StoreError::Corrupt {
                    key,
                    message: format!("unknown revocation reason '{raw}'"),
                }),
        }
    }

    pub fn is_revoked(&self, token_id: &str) -> StoreResult<bool> {
        Ok(self.reason(token_id)?.is_some())
    }
}
