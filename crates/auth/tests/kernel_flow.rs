//! End-to-end kernel flows over an in-memory shared store and a manual
//! clock: login/eviction policies, revocation visibility, step-up windows,
//! activity freeze, identity switching, and cross-type isolation.

use std::collections::HashMap;
use std::sync::Arc;

use vendra_auth::{
    AuthError, AuthKernel, AuthResult, BindPolicy, CapabilityResolver, CapabilitySet, KernelConfig,
    KernelRegistry, LoginOptions, NoCapabilities,
};
use vendra_core::{LoginId, LoginType, ManualClock, Ttl};
use vendra_store::InMemoryStore;

struct StaticResolver {
    capabilities: HashMap<LoginId, CapabilitySet>,
}

impl CapabilityResolver for StaticResolver {
    fn resolve(&self, _login_type: &LoginType, login_id: &LoginId) -> AuthResult<CapabilitySet> {
        Ok(self.capabilities.get(login_id).cloned().unwrap_or_default())
    }
}

struct Harness {
    kernel: AuthKernel,
    clock: Arc<ManualClock>,
}

fn harness(configure: impl FnOnce(KernelConfig) -> KernelConfig) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let config = configure(KernelConfig::new("member", b"member-signing-key".to_vec()));
    let kernel = AuthKernel::with_clock(config, store, Arc::new(NoCapabilities), clock.clone());
    Harness { kernel, clock }
}

#[test]
fn singleton_policy_leaves_exactly_one_session_valid() {
    let h = harness(|c| c.with_policy(BindPolicy::SingletonKickout));
    let first = h.kernel.login(LoginId::Int(1)).unwrap();
    let second = h.kernel.login(LoginId::Int(1)).unwrap();

    assert!(matches!(
        h.kernel.authenticate(&first.token_value),
        Err(AuthError::KickedOut)
    ));
    assert!(h.kernel.authenticate(&second.token_value).is_ok());
}

#[test]
fn concurrent_policy_keeps_both_sessions_valid() {
    let h = harness(|c| c.with_policy(BindPolicy::Concurrent));
    let first = h.kernel.login(LoginId::Int(1)).unwrap();
    let second = h.kernel.login(LoginId::Int(1)).unwrap();

    assert!(h.kernel.authenticate(&first.token_value).is_ok());
    assert!(h.kernel.authenticate(&second.token_value).is_ok());
    assert_eq!(h.kernel.tokens_of(&LoginId::Int(1), None).unwrap().len(), 2);
}

#[test]
fn replace_eviction_is_silent() {
    let h = harness(|c| c.with_policy(BindPolicy::SingletonReplace));
    let first = h.kernel.login(LoginId::Int(1)).unwrap();
    let _second = h.kernel.login(LoginId::Int(1)).unwrap();

    // Indistinguishable from ordinary expiry: plain not-authenticated.
    assert!(matches!(
        h.kernel.authenticate(&first.token_value),
        Err(AuthError::NotAuthenticated)
    ));
}

#[test]
fn logout_revokes_before_natural_expiry() {
    let h = harness(|c| c);
    let info = h.kernel.login(LoginId::Int(1)).unwrap();
    h.kernel.logout(&info.token_value).unwrap();

    // The signature-only check still passes; the session is gone.
    assert!(h.kernel.codec().parse(&info.token_value).is_ok());
    assert!(matches!(
        h.kernel.authenticate(&info.token_value),
        Err(AuthError::NotAuthenticated)
    ));
    assert!(!h.kernel.is_login(&info.token_value).unwrap());
}

#[test]
fn kickout_by_id_is_visible_to_the_evicted_caller() {
    let h = harness(|c| c);
    let info = h.kernel.login(LoginId::Int(1)).unwrap();
    h.kernel.kickout(&LoginId::Int(1), None).unwrap();

    assert!(matches!(
        h.kernel.authenticate(&info.token_value),
        Err(AuthError::KickedOut)
    ));
}

#[test]
fn device_scoped_logout_spares_other_devices() {
    let h = harness(|c| c);
    let id = LoginId::Int(1);
    let app = h
        .kernel
        .login_with(
            id.clone(),
            LoginOptions {
                device: Some("app".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    let web = h
        .kernel
        .login_with(
            id.clone(),
            LoginOptions {
                device: Some("web".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    h.kernel.logout_by_id(&id, Some("app")).unwrap();
    assert!(h.kernel.authenticate(&app.token_value).is_err());
    assert!(h.kernel.authenticate(&web.token_value).is_ok());
}

#[test]
fn banned_account_cannot_login_or_authenticate() {
    let h = harness(|c| c);
    let id = LoginId::Int(1);
    let info = h.kernel.login(id.clone()).unwrap();

    h.kernel.bans().ban(&id, "login", 1, Ttl::Secs(3600)).unwrap();

    // Banning is orthogonal to session termination, but both entry points
    // consult the registry.
    assert!(matches!(
        h.kernel.login(id.clone()),
        Err(AuthError::Banned { .. })
    ));
    assert!(matches!(
        h.kernel.authenticate(&info.token_value),
        Err(AuthError::Banned { .. })
    ));

    h.clock.advance_secs(3601);
    assert!(h.kernel.authenticate(&info.token_value).is_ok());
}

#[test]
fn step_up_window_expires_on_schedule() {
    let h = harness(|c| c);
    let info = h.kernel.login(LoginId::Int(77)).unwrap();
    let raw = &info.token_value;

    h.kernel.open_safe(raw, Some("pay"), Ttl::Secs(300)).unwrap();
    assert!(h.kernel.check_safe(raw, Some("pay")).is_ok());
    assert!(!h.kernel.is_safe(raw, Some("delete-account")).unwrap());

    h.clock.advance_secs(301);
    assert!(matches!(
        h.kernel.check_safe(raw, Some("pay")),
        Err(AuthError::SecondaryAuthRequired { service }) if service == "pay"
    ));
}

#[test]
fn switched_identity_restores_after_a_failed_operation() {
    let h = harness(|c| c);
    let me = LoginId::Int(1);
    assert_eq!(h.kernel.effective_login_id(&me), me);

    let result: Result<(), &str> = h.kernel.with_switched_identity(LoginId::Int(2), || {
        assert_eq!(h.kernel.effective_login_id(&me), LoginId::Int(2));
        Err("operation failed")
    });

    assert!(result.is_err());
    assert!(!h.kernel.is_switched());
    assert_eq!(h.kernel.effective_login_id(&me), me);
}

#[test]
fn inactivity_freezes_a_token_unless_touched() {
    let h = harness(|c| c.with_active_timeout(600));
    let info = h.kernel.login(LoginId::Int(1)).unwrap();
    let raw = &info.token_value;

    h.clock.advance_secs(540);
    h.kernel.touch(raw).unwrap();

    h.clock.advance_secs(540);
    assert!(h.kernel.authenticate(raw).is_ok());

    h.clock.advance_secs(700);
    assert!(matches!(
        h.kernel.authenticate(raw),
        Err(AuthError::NotAuthenticated)
    ));
}

#[test]
fn renewal_extends_the_marker_but_not_the_signed_window() {
    let h = harness(|c| c.with_timeout(Ttl::Secs(600)));
    let info = h.kernel.login(LoginId::Int(1)).unwrap();
    let raw = &info.token_value;

    h.kernel.renew_timeout(raw, Ttl::Secs(10_000)).unwrap();

    // Marker now outlives the signed expiry; the signature wins.
    h.clock.advance_secs(601);
    assert!(matches!(
        h.kernel.authenticate(raw),
        Err(AuthError::TokenExpired)
    ));
}

#[test]
fn capability_checks_follow_the_resolved_sets() {
    let clock = Arc::new(ManualClock::default());
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let resolver = StaticResolver {
        capabilities: HashMap::from([(
            LoginId::Int(1),
            CapabilitySet::new(
                ["a".to_string(), "b".to_string()],
                ["staff".to_string()],
            ),
        )]),
    };
    let kernel = AuthKernel::with_clock(
        KernelConfig::new("admin", b"admin-key".to_vec()),
        store,
        Arc::new(resolver),
        clock,
    );

    let holder = LoginId::Int(1);
    let stranger = LoginId::Int(2);

    assert!(kernel.has_permission_and(&holder, &["a", "b"]).unwrap());
    assert!(!kernel.has_permission_and(&holder, &["a", "c"]).unwrap());
    assert!(kernel.has_permission_or(&holder, &["c", "b"]).unwrap());
    assert!(!kernel.has_permission_or(&stranger, &["a", "b"]).unwrap());
    assert!(kernel.has_role(&holder, "staff").unwrap());

    let err = kernel.check_permission_and(&holder, &["a", "c"]).unwrap_err();
    assert!(matches!(err, AuthError::NotPermission { missing } if missing == vec!["c"]));

    let err = kernel.check_role(&stranger, "staff").unwrap_err();
    assert!(matches!(err, AuthError::NotRole { missing } if missing == vec!["staff"]));
}

#[test]
fn registered_types_are_fully_isolated() {
    let clock = Arc::new(ManualClock::default());
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));

    let registry = KernelRegistry::new()
        .register(AuthKernel::with_clock(
            KernelConfig::new("admin", b"admin-signing-key".to_vec()),
            store.clone(),
            Arc::new(NoCapabilities),
            clock.clone(),
        ))
        .register(AuthKernel::with_clock(
            KernelConfig::new("member", b"member-signing-key".to_vec()),
            store,
            Arc::new(NoCapabilities),
            clock,
        ));

    let member = registry.get("member").unwrap();
    let admin = registry.get("admin").unwrap();

    let info = member.login(LoginId::Int(1)).unwrap();
    assert!(matches!(
        admin.authenticate(&info.token_value),
        Err(AuthError::TokenMalformed(_))
    ));

    // Namespaces do not bleed either: the admin kernel sees no member tokens.
    assert!(admin.search_tokens("", 0, -1, true).unwrap().is_empty());
    assert_eq!(member.search_tokens("", 0, -1, true).unwrap().len(), 1);
}

#[test]
fn token_search_is_stable_and_ordered() {
    let h = harness(|c| c);
    for id in 1..=3 {
        h.kernel.login(LoginId::Int(id)).unwrap();
    }

    let first = h.kernel.search_tokens("", 0, -1, true).unwrap();
    let second = h.kernel.search_tokens("", 0, -1, true).unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);

    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted);

    let descending = h.kernel.search_tokens("", 0, -1, false).unwrap();
    assert_eq!(descending.first(), first.last());
}

#[test]
fn account_session_survives_until_full_logout() {
    let h = harness(|c| c);
    let id = LoginId::Int(1);
    h.kernel.login(id.clone()).unwrap();

    h.kernel
        .session(&id)
        .set("plan", serde_json::json!("gold"))
        .unwrap();
    assert_eq!(
        h.kernel.session(&id).get("plan").unwrap(),
        Some(serde_json::json!("gold"))
    );

    h.kernel.logout_by_id(&id, None).unwrap();
    assert_eq!(h.kernel.session(&id).get("plan").unwrap(), None);
}
