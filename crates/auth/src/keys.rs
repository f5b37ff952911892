//! Store key layout for one kernel namespace.
//!
//! All keys live under `{key_prefix}:{login_type}:` so coexisting principal
//! types never read each other's state.

use vendra_core::LoginId;

#[derive(Debug, Clone)]
pub(crate) struct Keyspace {
    ns: String,
}

impl Keyspace {
    pub(crate) fn new(key_prefix: &str, login_type: &str) -> Self {
        Self {
            ns: format!("{key_prefix}:{login_type}"),
        }
    }

    /// Validity marker for an issued token; its TTL is the token's remaining
    /// lifetime.
    pub(crate) fn token(&self, token_id: &str) -> String {
        format!("{}:token:{token_id}", self.ns)
    }

    pub(crate) fn token_prefix(&self) -> String {
        format!("{}:token:", self.ns)
    }

    pub(crate) fn revoked(&self, token_id: &str) -> String {
        format!("{}:revoked:{token_id}", self.ns)
    }

    pub(crate) fn device(&self, login_id: &LoginId, device: &str) -> String {
        format!("{}:device:{login_id}:{device}", self.ns)
    }

    pub(crate) fn device_prefix(&self, login_id: &LoginId) -> String {
        format!("{}:device:{login_id}:", self.ns)
    }

    pub(crate) fn ban(&self, login_id: &LoginId, service: &str) -> String {
        format!("{}:ban:{login_id}:{service}", self.ns)
    }

    pub(crate) fn safe(&self, subject: &str, service: &str) -> String {
        format!("{}:safe:{subject}:{service}", self.ns)
    }

    pub(crate) fn safe_prefix(&self, subject: &str) -> String {
        format!("{}:safe:{subject}:", self.ns)
    }

    pub(crate) fn session(&self, login_id: &LoginId) -> String {
        format!("{}:session:{login_id}", self.ns)
    }

    pub(crate) fn session_prefix(&self) -> String {
        format!("{}:session:", self.ns)
    }

    pub(crate) fn active(&self, token_id: &str) -> String {
        format!("{}:active:{token_id}", self.ns)
    }
}
