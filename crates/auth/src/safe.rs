//! Step-up ("secondary") authentication windows.
//!
//! Being logged in and having recently re-proven identity are different
//! facts. A window is opened after an explicit re-verification and read by
//! sensitive operations; it expires on its own or is closed explicitly.
//! Depending on kernel configuration the window follows the principal or a
//! single token.

use std::sync::Arc;

use vendra_core::{Remaining, Ttl};
use vendra_store::{SharedStore, StoreResult};

use crate::error::{AuthError, AuthResult};
use crate::keys::Keyspace;

/// Service used when the caller does not name one.
pub const DEFAULT_SAFE_SERVICE: &str = "important";

pub struct SecondaryAuthTracker {
    store: Arc<dyn SharedStore>,
    keys: Arc<Keyspace>,
}

impl SecondaryAuthTracker {
    pub(crate) fn new(store: Arc<dyn SharedStore>, keys: Arc<Keyspace>) -> Self {
        Self { store, keys }
    }

    /// Open (or refresh) a window for `subject` on `service`.
    pub fn open(&self, subject: &str, service: &str, duration: Ttl) -> StoreResult<()> {
        let key = self.keys.safe(subject, service);
        self.store.set(&key, "1", duration)?;
        tracing::debug!(subject, service, duration = duration.as_secs_i64(), "step-up window opened");
        Ok(())
    }

    pub fn is_open(&self, subject: &str, service: &str) -> StoreResult<bool> {
        Ok(self.store.get(&self.keys.safe(subject, service))?.is_some())
    }

    pub fn check(&self, subject: &str, service: &str) -> AuthResult<()> {
        if self.is_open(subject, service)? {
            Ok(())
        } else {
            Err(AuthError::SecondaryAuthRequired {
                service: service.to_string(),
            })
        }
    }

    /// Remaining window time (`Absent` = no open window).
    pub fn remaining(&self, subject: &str, service: &str) -> StoreResult<Remaining> {
        self.store.remaining(&self.keys.safe(subject, service))
    }

    /// Close the window for one service, or every window for the subject.
    pub fn close(&self, subject: &str, service: Option<&str>) -> StoreResult<()> {
        match service {
            Some(service) => self.store.delete(&self.keys.safe(subject, service)),
            None => {
                for key in self.store.keys_with_prefix(&self.keys.safe_prefix(subject))? {
                    self.store.delete(&key)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendra_core::ManualClock;
    use vendra_store::InMemoryStore;

    fn tracker() -> (SecondaryAuthTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));
        (
            SecondaryAuthTracker::new(store, Arc::new(Keyspace::new("vendra", "member"))),
            clock,
        )
    }

    #[test]
    fn window_expires_after_duration() {
        let (tracker, clock) = tracker();
        tracker.open("77", "pay", Ttl::Secs(300)).unwrap();
        assert!(tracker.check("77", "pay").is_ok());

        clock.advance_secs(301);
        let err = tracker.check("77", "pay").unwrap_err();
        assert!(matches!(
            err,
            AuthError::SecondaryAuthRequired { service } if service == "pay"
        ));
    }

    #[test]
    fn windows_are_service_scoped() {
        let (tracker, _) = tracker();
        tracker.open("77", "pay", Ttl::Secs(300)).unwrap();
        assert!(!tracker.is_open("77", "delete-account").unwrap());
    }

    #[test]
    fn close_without_service_clears_everything() {
        let (tracker, _) = tracker();
        tracker.open("77", "pay", Ttl::Secs(300)).unwrap();
        tracker.open("77", "transfer", Ttl::Secs(300)).unwrap();

        tracker.close("77", None).unwrap();
        assert!(!tracker.is_open("77", "pay").unwrap());
        assert!(!tracker.is_open("77", "transfer").unwrap());
    }

    #[test]
    fn remaining_reports_window_time() {
        let (tracker, clock) = tracker();
        tracker.open("77", "pay", Ttl::Secs(300)).unwrap();
        clock.advance_secs(100);
        assert_eq!(tracker.remaining("77", "pay").unwrap(), Remaining::Secs(200));
        assert!(tracker.remaining("77", "other").unwrap().is_absent());
    }
}
