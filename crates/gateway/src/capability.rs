//! Capability resolution at the edge.
//!
//! Two dispatch variants exist side by side, selected by login type: the
//! back-office realm reads permission codes pinned to its own account
//! session at login (no extra round trip to the admin service), while the
//! storefront realm never carries authorization codes at all.

use std::collections::HashSet;
use std::sync::Arc;

use vendra_auth::{
    AccountSession, AuthResult, CapabilityResolver, CapabilitySet, KernelRegistry,
};
use vendra_core::{LoginId, LoginType, Ttl};
use vendra_store::SharedStore;

/// Session field the login handler pins permission codes under.
pub const SESSION_PERMISSIONS_FIELD: &str = "permissions";

/// Session field the login handler pins role codes under.
pub const SESSION_ROLES_FIELD: &str = "roles";

/// Resolver that reads codes from the principal's account session payload.
pub struct SessionCapabilityResolver {
    store: Arc<dyn SharedStore>,
    key_prefix: String,
    session_ttl: Ttl,
}

impl SessionCapabilityResolver {
    pub fn new(store: Arc<dyn SharedStore>, key_prefix: impl Into<String>, session_ttl: Ttl) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            session_ttl,
        }
    }

    fn string_list(value: Option<serde_json::Value>) -> Vec<String> {
        match value {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl CapabilityResolver for SessionCapabilityResolver {
    fn resolve(&self, login_type: &LoginType, login_id: &LoginId) -> AuthResult<CapabilitySet> {
        let session = AccountSession::open(
            self.store.clone(),
            &self.key_prefix,
            login_type,
            login_id,
            self.session_ttl,
        );
        let permissions = Self::string_list(session.get(SESSION_PERMISSIONS_FIELD)?);
        let roles = Self::string_list(session.get(SESSION_ROLES_FIELD)?);
        Ok(CapabilitySet::new(permissions, roles))
    }
}

/// Request-permission source for a reverse proxy.
///
/// Queried only for the principal type actually making the request; types
/// that declare no externally visible codes get an empty answer without any
/// resolver round trip.
pub struct GatewayCapabilitySource {
    registry: Arc<KernelRegistry>,
    code_bearing_types: HashSet<String>,
}

impl GatewayCapabilitySource {
    pub fn new(
        registry: Arc<KernelRegistry>,
        code_bearing_types: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            registry,
            code_bearing_types: code_bearing_types.into_iter().collect(),
        }
    }

    pub fn permissions_for(&self, login_type: &str, login_id: &LoginId) -> AuthResult<Vec<String>> {
        if !self.code_bearing_types.contains(login_type) {
            return Ok(Vec::new());
        }
        let Some(kernel) = self.registry.get(login_type) else {
            return Ok(Vec::new());
        };
        let mut codes: Vec<String> = kernel.capabilities(login_id)?.permissions.into_iter().collect();
        codes.sort();
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vendra_auth::{AuthKernel, KernelConfig, NoCapabilities};
    use vendra_store::InMemoryStore;

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn session_resolver_reads_pinned_codes() {
        let store = store();
        let resolver =
            SessionCapabilityResolver::new(store.clone(), "vendra", Ttl::Secs(3600));
        let login_type = LoginType::new("admin");
        let id = LoginId::Int(9);

        AccountSession::open(store.clone(), "vendra", &login_type, &id, Ttl::Secs(3600))
            .set(SESSION_PERMISSIONS_FIELD, json!(["pms:read", "oms:list"]))
            .unwrap();

        let caps = resolver.resolve(&login_type, &id).unwrap();
        assert!(caps.permissions.contains("pms:read"));
        assert!(caps.permissions.contains("oms:list"));
        assert!(caps.roles.is_empty());
    }

    #[test]
    fn session_resolver_is_empty_for_unknown_principal() {
        let resolver = SessionCapabilityResolver::new(store(), "vendra", Ttl::Secs(3600));
        let caps = resolver
            .resolve(&LoginType::new("admin"), &LoginId::Int(404))
            .unwrap();
        assert_eq!(caps, CapabilitySet::default());
    }

    #[test]
    fn code_free_types_short_circuit_to_empty() {
        let store = store();
        let registry = Arc::new(
            vendra_auth::KernelRegistry::new().register(AuthKernel::new(
                KernelConfig::new("member", b"k".to_vec()),
                store,
                Arc::new(NoCapabilities),
            )),
        );
        let source = GatewayCapabilitySource::new(registry, ["admin".to_string()]);

        let codes = source.permissions_for("member", &LoginId::Int(1)).unwrap();
        assert!(codes.is_empty());
    }
}
