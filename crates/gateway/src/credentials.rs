//! Credential verification seam.
//!
//! The gateway never checks passwords itself; the real deployment delegates
//! to the admin-service and member-service over the network. This trait is
//! that seam, with a static in-process implementation for tests/dev.

use std::collections::HashMap;

use thiserror::Error;

use vendra_core::LoginId;

/// Outcome of a successful credential check.
#[derive(Debug, Clone)]
pub struct VerifiedAccount {
    pub login_id: LoginId,
    /// Capability codes to pin to the account session (admin realm only).
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username or password is incorrect")]
    BadCredentials,

    #[error("credential service unavailable: {0}")]
    Unavailable(String),
}

pub trait CredentialService: Send + Sync {
    fn admin_login(&self, username: &str, password: &str)
    -> Result<VerifiedAccount, CredentialError>;

    fn member_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<VerifiedAccount, CredentialError>;
}

/// Fixed account table for tests/dev.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    admins: HashMap<String, (String, VerifiedAccount)>,
    members: HashMap<String, (String, VerifiedAccount)>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        account: VerifiedAccount,
    ) -> Self {
        self.admins.insert(username.into(), (password.into(), account));
        self
    }

    pub fn with_member(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        account: VerifiedAccount,
    ) -> Self {
        self.members.insert(username.into(), (password.into(), account));
        self
    }
}

fn verify(
    table: &HashMap<String, (String, VerifiedAccount)>,
    username: &str,
    password: &str,
) -> Result<VerifiedAccount, CredentialError> {
    match table.get(username) {
        Some((expected, account)) if expected == password => Ok(account.clone()),
        _ => Err(CredentialError::BadCredentials),
    }
}

impl CredentialService for StaticCredentials {
    fn admin_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<VerifiedAccount, CredentialError> {
        verify(&self.admins, username, password)
    }

    fn member_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<VerifiedAccount, CredentialError> {
        verify(&self.members, username, password)
    }
}
