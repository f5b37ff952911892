//! Kernel error taxonomy.
//!
//! Every `check_*` operation returns exactly one of these; boolean `is_*` /
//! `has_*` queries answer `false` instead of raising, with one exception:
//! store faults always surface (fail-closed, never fail-open).

use thiserror::Error;

use vendra_core::Remaining;
use vendra_store::StoreError;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// No token, unknown token, or a session that no longer exists.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The token's validity window has passed.
    #[error("token expired")]
    TokenExpired,

    /// The token's signature or structure did not verify.
    #[error("token malformed: {0}")]
    TokenMalformed(String),

    /// The session was forcibly terminated and the eviction is meant to be
    /// visible to the evicted caller.
    #[error("session was kicked out")]
    KickedOut,

    #[error("account banned from service '{service}' at level {level}")]
    Banned {
        service: String,
        level: u32,
        remaining: Remaining,
    },

    #[error("missing permission: {}", missing.join(", "))]
    NotPermission { missing: Vec<String> },

    #[error("missing role: {}", missing.join(", "))]
    NotRole { missing: Vec<String> },

    #[error("secondary authentication required for service '{service}'")]
    SecondaryAuthRequired { service: String },

    /// Extra-claim access on a token issued by a plain (non-claim-carrying)
    /// codec.
    #[error("token carries no extra claims")]
    UnsupportedMode,

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl AuthError {
    /// Whether this error is a store fault that must surface through boolean
    /// queries instead of being read as "no".
    pub fn is_store_fault(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_))
    }
}
