use vendra_core::{LoginType, Ttl};

/// Eviction behavior when a second login lands on an occupied
/// (principal, device) slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BindPolicy {
    /// Concurrent logins on the same device type are all valid.
    #[default]
    Concurrent,
    /// Evict the previous session; the evicted caller sees a distinguished
    /// kicked-out error on its next request.
    SingletonKickout,
    /// Evict the previous session silently; the evicted caller simply becomes
    /// unauthenticated.
    SingletonReplace,
}

/// What a step-up window is keyed on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SafeSubject {
    /// Windows follow the account: any of the principal's sessions may use
    /// an open window.
    #[default]
    Principal,
    /// Windows follow one token: re-verification is per device session.
    Token,
}

/// Per-principal-type kernel configuration.
///
/// Each registered login type owns one of these; signing keys, key prefixes
/// and timeout policies never collide across types.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub login_type: LoginType,

    /// HMAC key for this type's tokens.
    pub signing_key: Vec<u8>,

    /// Store key namespace root. Full namespace is `{key_prefix}:{login_type}`.
    pub key_prefix: String,

    /// Header/parameter name under which clients submit the token.
    pub token_name: String,

    /// Default token lifetime.
    pub timeout: Ttl,

    /// Inactivity window after which a token freezes. `None` = never.
    pub active_timeout: Option<u64>,

    pub policy: BindPolicy,

    /// Whether issued tokens carry extra claims.
    pub claims_mode: bool,

    pub safe_subject: SafeSubject,
}

impl KernelConfig {
    /// 30-day tokens, concurrent logins, claim-carrying codec.
    pub fn new(login_type: impl Into<LoginType>, signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            login_type: login_type.into(),
            signing_key: signing_key.into(),
            key_prefix: "vendra".to_string(),
            token_name: "vendra-token".to_string(),
            timeout: Ttl::Secs(30 * 24 * 3600),
            active_timeout: None,
            policy: BindPolicy::default(),
            claims_mode: true,
            safe_subject: SafeSubject::default(),
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Ttl) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_active_timeout(mut self, secs: u64) -> Self {
        self.active_timeout = Some(secs);
        self
    }

    pub fn with_policy(mut self, policy: BindPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_claims_mode(mut self, claims_mode: bool) -> Self {
        self.claims_mode = claims_mode;
        self
    }

    pub fn with_safe_subject(mut self, subject: SafeSubject) -> Self {
        self.safe_subject = subject;
        self
    }
}
