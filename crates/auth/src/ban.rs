//! Hierarchical, service-scoped account bans.
//!
//! Bans are independent of login state: issuing one never revokes tokens,
//! and an account can be banned while logged out. One live record exists per
//! (principal, service); re-banning the same scope overwrites level and
//! expiry unconditionally. Expired records are implicitly absent (store-side
//! TTL).

use std::sync::Arc;

use vendra_core::{LoginId, Remaining, Ttl};
use vendra_store::{SharedStore, StoreError, StoreResult};

use crate::error::{AuthError, AuthResult};
use crate::keys::Keyspace;

/// Service consulted by login and authenticate.
pub const DEFAULT_BAN_SERVICE: &str = "login";

/// Matches every service on check.
pub const WILDCARD_SERVICE: &str = "*";

/// Severity assigned when the caller does not pick one.
pub const DEFAULT_BAN_LEVEL: u32 = 1;

pub struct BanRegistry {
    store: Arc<dyn SharedStore>,
    keys: Arc<Keyspace>,
}

impl BanRegistry {
    pub(crate) fn new(store: Arc<dyn SharedStore>, keys: Arc<Keyspace>) -> Self {
        Self { store, keys }
    }

    /// Upsert a ban. `duration = Ttl::Forever` is a permanent ban.
    pub fn ban(
        &self,
        login_id: &LoginId,
        service: &str,
        level: u32,
        duration: Ttl,
    ) -> StoreResult<()> {
        let key = self.keys.ban(login_id, service);
        self.store.set(&key, &level.to_string(), duration)?;
        tracing::info!(
            login_id = %login_id,
            service,
            level,
            duration = duration.as_secs_i64(),
            "account banned"
        );
        Ok(())
    }

    /// Active ban level for (principal, service), considering the wildcard
    /// record. `None` = not banned.
    pub fn level(&self, login_id: &LoginId, service: &str) -> StoreResult<Option<(u32, Remaining)>> {
        let mut best: Option<(u32, Remaining)> = None;
        let mut scopes = vec![service];
        if service != WILDCARD_SERVICE {
            scopes.push(WILDCARD_SERVICE);
        }

        for scope in scopes {
            let key = self.keys.ban(login_id, scope);
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            let level: u32 = raw.parse().map_err(|_| StoreError::Corrupt {
                key: key.clone(),
                message: format!("ban level '{raw}' is not a number"),
            })?;
            if best.as_ref().is_none_or(|(l, _)| level > *l) {
                best = Some((level, self.store.remaining(&key)?));
            }
        }
        Ok(best)
    }

    pub fn is_banned(&self, login_id: &LoginId, service: &str) -> StoreResult<bool> {
        Ok(self.level(login_id, service)?.is_some())
    }

    pub fn is_banned_at_least(
        &self,
        login_id: &LoginId,
        service: &str,
        min_level: u32,
    ) -> StoreResult<bool> {
        Ok(self
            .level(login_id, service)?
            .is_some_and(|(level, _)| level >= min_level))
    }

    /// Remaining ban time for the scope (`Absent` = not banned).
    pub fn remaining(&self, login_id: &LoginId, service: &str) -> StoreResult<Remaining> {
        Ok(match self.level(login_id, service)? {
            Some((_, remaining)) => remaining,
            None => Remaining::Absent,
        })
    }

    /// Fail on the first service with an active ban at or above `min_level`.
    pub fn check(&self, login_id: &LoginId, services: &[&str], min_level: u32) -> AuthResult<()> {
        for service in services {
            if let Some((level, remaining)) = self.level(login_id, service)? {
                if level >= min_level {
                    return Err(AuthError::Banned {
                        service: service.to_string(),
                        level,
                        remaining,
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove bans; removing a non-existent record is a no-op.
    pub fn unban(&self, login_id: &LoginId, services: &[&str]) -> StoreResult<()> {
        for service in services {
            self.store.delete(&self.keys.ban(login_id, service))?;
        }
        tracing::info!(login_id = %login_id, ?services, "account unbanned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendra_core::ManualClock;
    use vendra_store::InMemoryStore;

    fn registry() -> (BanRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));
        (
            BanRegistry::new(store, Arc::new(Keyspace::new("vendra", "member"))),
            clock,
        )
    }

    #[test]
    fn ban_expires_with_its_ttl() {
        let (bans, clock) = registry();
        let id = LoginId::Int(1);
        bans.ban(&id, "checkout", 2, Ttl::Secs(3600)).unwrap();

        assert!(bans.is_banned_at_least(&id, "checkout", 2).unwrap());
        assert!(!bans.is_banned_at_least(&id, "checkout", 3).unwrap());

        clock.advance_secs(3601);
        assert!(!bans.is_banned_at_least(&id, "checkout", 2).unwrap());
        assert!(bans.remaining(&id, "checkout").unwrap().is_absent());
    }

    #[test]
    fn wildcard_ban_blocks_every_service() {
        let (bans, _) = registry();
        let id = LoginId::Int(1);
        bans.ban(&id, WILDCARD_SERVICE, 1, Ttl::Forever).unwrap();

        let err = bans.check(&id, &["anything"], 1).unwrap_err();
        match err {
            AuthError::Banned {
                service,
                level,
                remaining,
            } => {
                assert_eq!(service, "anything");
                assert_eq!(level, 1);
                assert_eq!(remaining, Remaining::Forever);
            }
            other => panic!("expected Banned, got {other:?}"),
        }
    }

    #[test]
    fn reban_overwrites_level_and_expiry() {
        let (bans, _) = registry();
        let id = LoginId::Int(1);
        bans.ban(&id, "comment", 5, Ttl::Forever).unwrap();
        bans.ban(&id, "comment", 2, Ttl::Secs(60)).unwrap();

        let (level, remaining) = bans.level(&id, "comment").unwrap().unwrap();
        assert_eq!(level, 2);
        assert_eq!(remaining, Remaining::Secs(60));
    }

    #[test]
    fn unban_is_idempotent() {
        let (bans, _) = registry();
        let id = LoginId::Int(1);
        bans.ban(&id, "comment", 1, Ttl::Forever).unwrap();
        bans.unban(&id, &["comment", "never-banned"]).unwrap();
        assert!(!bans.is_banned(&id, "comment").unwrap());
    }

    #[test]
    fn check_scans_services_in_order() {
        let (bans, _) = registry();
        let id = LoginId::Int(1);
        bans.ban(&id, "pay", 3, Ttl::Secs(60)).unwrap();

        assert!(bans.check(&id, &["browse"], 1).is_ok());
        let err = bans.check(&id, &["browse", "pay"], 1).unwrap_err();
        assert!(matches!(err, AuthError::Banned { service, .. } if service == "pay"));
    }
}
