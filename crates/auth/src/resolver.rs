//! Capability resolution contract.
//!
//! The kernel stores and enforces membership in permission/role code sets;
//! it never decides what a code grants or where codes come from. One
//! resolver is registered per principal type.

use std::collections::HashSet;

use vendra_core::{LoginId, LoginType};

use crate::error::AuthResult;

/// Resolved capability codes for one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub permissions: HashSet<String>,
    pub roles: HashSet<String>,
}

impl CapabilitySet {
    pub fn new(
        permissions: impl IntoIterator<Item = String>,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            roles: roles.into_iter().collect(),
        }
    }
}

/// External collaborator that supplies capability codes.
///
/// Implementations may read a database, a session payload, or nothing at
/// all; a type that carries no authorization codes returns the empty set.
pub trait CapabilityResolver: Send + Sync {
    fn resolve(&self, login_type: &LoginType, login_id: &LoginId) -> AuthResult<CapabilitySet>;
}

/// Resolver for principal types that never expose capability codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapabilities;

impl CapabilityResolver for NoCapabilities {
    fn resolve(&self, _login_type: &LoginType, _login_id: &LoginId) -> AuthResult<CapabilitySet> {
        Ok(CapabilitySet::default())
    }
}
