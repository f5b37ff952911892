//! `vendra-auth` — multi-principal session/token authorization kernel.
//!
//! A second, independent principal type (storefront members) layered on the
//! same machinery that serves back-office administrators: signed bearer
//! tokens, shared revocation records, per-device session tracking,
//! hierarchical service bans, step-up authentication windows, and scoped
//! identity switching. Each principal type owns one [`AuthKernel`] with its
//! own signing key, store namespace and timeout policy, looked up through
//! [`KernelRegistry`].
//!
//! The crate is decoupled from HTTP and from any particular store; durable
//! state lives behind the `vendra-store` contract.

pub mod ban;
pub mod config;
pub mod device;
pub mod error;
mod keys;
pub mod kernel;
pub mod registry;
pub mod resolver;
pub mod revocation;
pub mod safe;
pub mod session;
pub mod switch;
pub mod token;

pub use ban::{BanRegistry, DEFAULT_BAN_LEVEL, DEFAULT_BAN_SERVICE, WILDCARD_SERVICE};
pub use config::{BindPolicy, KernelConfig, SafeSubject};
pub use device::{DEFAULT_DEVICE, DeviceSessionIndex};
pub use error::{AuthError, AuthResult};
pub use kernel::{AuthKernel, LoginOptions, Principal, TokenInfo};
pub use registry::KernelRegistry;
pub use resolver::{CapabilityResolver, CapabilitySet, NoCapabilities};
pub use revocation::{RevocationStore, RevokeReason};
pub use safe::{DEFAULT_SAFE_SERVICE, SecondaryAuthTracker};
pub use session::AccountSession;
pub use switch::SwitchGuard;
pub use token::{Token, TokenCodec};
