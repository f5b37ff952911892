//! The per-principal-type authorization kernel.
//!
//! One `AuthKernel` instance serves one login type. It owns that type's
//! token codec, revocation records, device index, ban registry and step-up
//! tracker, all rooted under the type's own store namespace. The kernel is
//! stateless in-process: every durable fact lives in the shared store, so
//! any service instance can answer for any session.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use vendra_core::{Clock, LoginId, LoginType, Remaining, SystemClock, Ttl};
use vendra_store::{SharedStore, search_keys};

use crate::ban::{BanRegistry, DEFAULT_BAN_LEVEL, DEFAULT_BAN_SERVICE};
use crate::config::{BindPolicy, KernelConfig, SafeSubject};
use crate::device::{DEFAULT_DEVICE, DeviceSessionIndex};
use crate::error::{AuthError, AuthResult};
use crate::keys::Keyspace;
use crate::resolver::{CapabilityResolver, CapabilitySet};
use crate::revocation::{RevocationStore, RevokeReason};
use crate::safe::{DEFAULT_SAFE_SERVICE, SecondaryAuthTracker};
use crate::session::AccountSession;
use crate::switch::{self, SwitchGuard};
use crate::token::{Token, TokenCodec};

/// An authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub login_type: LoginType,
    pub login_id: LoginId,
}

/// Per-login overrides; unset fields fall back to kernel configuration.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    pub device: Option<String>,
    pub timeout: Option<Ttl>,
    pub policy: Option<BindPolicy>,
    pub extra: Map<String, Value>,
}

/// Snapshot handed back to the edge after a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub token_name: String,
    pub token_value: String,
    pub login_type: LoginType,
    pub login_id: LoginId,
    pub device: Option<String>,
    pub timeout: Remaining,
    /// Inactivity freeze window in seconds; `-1` = never freezes.
    pub active_timeout: i64,
}

pub struct AuthKernel {
    config: KernelConfig,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    keys: Arc<Keyspace>,
    codec: TokenCodec,
    revocations: Arc<RevocationStore>,
    devices: DeviceSessionIndex,
    bans: BanRegistry,
    safe: SecondaryAuthTracker,
    resolver: Arc<dyn CapabilityResolver>,
}

impl AuthKernel {
    pub fn new(
        config: KernelConfig,
        store: Arc<dyn SharedStore>,
        resolver: Arc<dyn CapabilityResolver>,
    ) -> Self {
        Self::with_clock(config, store, resolver, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: KernelConfig,
        store: Arc<dyn SharedStore>,
        resolver: Arc<dyn CapabilityResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let keys = Arc::new(Keyspace::new(&config.key_prefix, config.login_type.as_str()));
        let codec = TokenCodec::new(
            &config.signing_key,
            config.login_type.clone(),
            config.claims_mode,
            clock.clone(),
        );
        let revocations = Arc::new(RevocationStore::new(store.clone(), keys.clone()));
        let devices = DeviceSessionIndex::new(store.clone(), keys.clone(), revocations.clone());
        let bans = BanRegistry::new(store.clone(), keys.clone());
        let safe = SecondaryAuthTracker::new(store.clone(), keys.clone());

        Self {
            config,
            store,
            clock,
            keys,
            codec,
            revocations,
            devices,
            bans,
            safe,
            resolver,
        }
    }

    pub fn login_type(&self) -> &LoginType {
        &self.config.login_type
    }

    pub fn token_name(&self) -> &str {
        &self.config.token_name
    }

    // ─── component access ────────────────────────────────────────────────

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn revocations(&self) -> &RevocationStore {
        &self.revocations
    }

    pub fn devices(&self) -> &DeviceSessionIndex {
        &self.devices
    }

    pub fn bans(&self) -> &BanRegistry {
        &self.bans
    }

    pub fn secondary_auth(&self) -> &SecondaryAuthTracker {
        &self.safe
    }

    // ─── login / logout ──────────────────────────────────────────────────

    pub fn login(&self, login_id: LoginId) -> AuthResult<TokenInfo> {
        self.login_with(login_id, LoginOptions::default())
    }

    /// Issue a token, record its validity marker, and bind its device slot.
    ///
    /// Fails with [`AuthError::Banned`] when the account carries an active
    /// login-service ban.
    pub fn login_with(&self, login_id: LoginId, options: LoginOptions) -> AuthResult<TokenInfo> {
        self.bans
            .check(&login_id, &[DEFAULT_BAN_SERVICE], DEFAULT_BAN_LEVEL)?;

        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let policy = options.policy.unwrap_or(self.config.policy);
        let token = self
            .codec
            .issue(login_id.clone(), options.device, timeout, options.extra)?;

        let now = self.clock.now();
        self.store
            .set(&self.keys.token(&token.id), &login_id.as_string(), timeout)?;
        if self.config.active_timeout.is_some() {
            self.store
                .set(&self.keys.active(&token.id), &now.to_rfc3339(), timeout)?;
        }

        let slot = token.device.as_deref().unwrap_or(DEFAULT_DEVICE);
        let evicted = self
            .devices
            .bind(&login_id, slot, &token.id, timeout, policy)?;

        tracing::info!(
            login_type = %self.config.login_type,
            login_id = %login_id,
            device = slot,
            evicted = evicted.len(),
            "login"
        );

        Ok(TokenInfo {
            token_name: self.config.token_name.clone(),
            token_value: token.value.clone(),
            login_type: self.config.login_type.clone(),
            login_id,
            device: token.device.clone(),
            timeout: Remaining::until(token.expires_at, now),
            active_timeout: self.config.active_timeout.map_or(-1, |s| s as i64),
        })
    }

    /// End the session behind `raw`.
    ///
    /// An expired token is already logged out (no-op); a malformed one is an
    /// error, since it never named a session.
    pub fn logout(&self, raw: &str) -> AuthResult<()> {
        let token = match self.codec.parse(raw) {
            Ok(token) => token,
            Err(AuthError::TokenExpired) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.end_session(&token, RevokeReason::Logout)
    }

    /// Log out a principal everywhere, or on one device type.
    pub fn logout_by_id(&self, login_id: &LoginId, device: Option<&str>) -> AuthResult<()> {
        self.terminate(login_id, device, RevokeReason::Logout)
    }

    /// Forcibly terminate sessions; the evicted caller sees
    /// [`AuthError::KickedOut`] on its next request.
    pub fn kickout(&self, login_id: &LoginId, device: Option<&str>) -> AuthResult<()> {
        self.terminate(login_id, device, RevokeReason::Kickout)
    }

    pub fn kickout_by_token(&self, raw: &str) -> AuthResult<()> {
        let token = self.codec.parse(raw)?;
        self.end_session(&token, RevokeReason::Kickout)
    }

    /// Silently evict sessions; the evicted caller just becomes
    /// unauthenticated.
    pub fn replaced(&self, login_id: &LoginId, device: Option<&str>) -> AuthResult<()> {
        self.terminate(login_id, device, RevokeReason::Replaced)
    }

    fn end_session(&self, token: &Token, reason: RevokeReason) -> AuthResult<()> {
        let slot = token.device.as_deref().unwrap_or(DEFAULT_DEVICE);
        self.devices
            .unbind_token(&token.login_id, slot, &token.id, reason)?;
        tracing::info!(
            login_type = %self.config.login_type,
            login_id = %token.login_id,
            reason = reason.as_str(),
            "session ended"
        );
        Ok(())
    }

    fn terminate(
        &self,
        login_id: &LoginId,
        device: Option<&str>,
        reason: RevokeReason,
    ) -> AuthResult<()> {
        let evicted = self.devices.unbind(login_id, device, reason)?;
        if device.is_none() {
            self.session(login_id).clear()?;
        }
        tracing::info!(
            login_type = %self.config.login_type,
            login_id = %login_id,
            ?device,
            reason = reason.as_str(),
            sessions = evicted.len(),
            "sessions terminated"
        );
        Ok(())
    }

    // ─── authentication ──────────────────────────────────────────────────

    /// Full bearer-token check: signature, expiry, revocation, validity
    /// marker, activity freeze, and login-service ban, in that order.
    pub fn authenticate(&self, raw: &str) -> AuthResult<Principal> {
        let token = self.codec.parse(raw)?;

        match self.revocations.reason(&token.id)? {
            Some(RevokeReason::Kickout) => return Err(AuthError::KickedOut),
            Some(_) => return Err(AuthError::NotAuthenticated),
            None => {}
        }

        if self.store.get(&self.keys.token(&token.id))?.is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        self.check_active(&token)?;
        self.bans
            .check(&token.login_id, &[DEFAULT_BAN_SERVICE], DEFAULT_BAN_LEVEL)?;

        Ok(Principal {
            login_type: self.config.login_type.clone(),
            login_id: token.login_id,
        })
    }

    pub fn check_login(&self, raw: &str) -> AuthResult<Principal> {
        self.authenticate(raw)
    }

    /// Boolean form of [`Self::authenticate`]; store faults still surface.
    pub fn is_login(&self, raw: &str) -> AuthResult<bool> {
        match self.authenticate(raw) {
            Ok(_) => Ok(true),
            Err(e) if e.is_store_fault() => Err(e),
            Err(_) => Ok(false),
        }
    }

    /// Principal behind a token, `None` when it no longer authenticates.
    pub fn login_id_by_token(&self, raw: &str) -> AuthResult<Option<LoginId>> {
        match self.authenticate(raw) {
            Ok(principal) => Ok(Some(principal.login_id)),
            Err(e) if e.is_store_fault() => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Whether the principal has at least one live session.
    pub fn is_login_id(&self, login_id: &LoginId) -> AuthResult<bool> {
        Ok(!self.devices.list_tokens(login_id, None)?.is_empty())
    }

    // ─── token introspection / renewal ───────────────────────────────────

    /// Remaining session lifetime of `raw` (marker TTL capped by the signed
    /// expiry).
    pub fn token_remaining(&self, raw: &str) -> AuthResult<Remaining> {
        let token = self.codec.parse(raw)?;
        self.effective_remaining(&token)
    }

    pub fn token_info(&self, raw: &str) -> AuthResult<TokenInfo> {
        let token = self.codec.parse(raw)?;
        let timeout = self.effective_remaining(&token)?;
        Ok(TokenInfo {
            token_name: self.config.token_name.clone(),
            token_value: token.value.clone(),
            login_type: self.config.login_type.clone(),
            login_id: token.login_id,
            device: token.device,
            timeout,
            active_timeout: self.config.active_timeout.map_or(-1, |s| s as i64),
        })
    }

    /// Extend the session lifetime of `raw`.
    ///
    /// The signed expiry is an upper bound: a renewal can stretch the
    /// validity marker, but never past the window baked into the signature.
    pub fn renew_timeout(&self, raw: &str, timeout: Ttl) -> AuthResult<()> {
        let token = self.codec.parse(raw)?;
        self.store.expire(&self.keys.token(&token.id), timeout)?;
        if self.config.active_timeout.is_some() {
            self.store.expire(&self.keys.active(&token.id), timeout)?;
        }
        let slot = token.device.as_deref().unwrap_or(DEFAULT_DEVICE);
        self.devices.extend_slot(&token.login_id, slot, timeout)?;
        Ok(())
    }

    fn effective_remaining(&self, token: &Token) -> AuthResult<Remaining> {
        let marker = self.store.remaining(&self.keys.token(&token.id))?;
        let signed = Remaining::until(token.expires_at, self.clock.now());
        Ok(min_remaining(marker, signed))
    }

    // ─── activity freeze ─────────────────────────────────────────────────

    /// Renew the token's last-activity timestamp. Succeeds even on a frozen
    /// token; call [`Self::check_active_timeout`] first to detect freezing.
    pub fn touch(&self, raw: &str) -> AuthResult<()> {
        if self.config.active_timeout.is_none() {
            return Ok(());
        }
        let token = self.codec.parse(raw)?;
        let ttl = match self.store.remaining(&self.keys.token(&token.id))? {
            Remaining::Absent => return Err(AuthError::NotAuthenticated),
            Remaining::Forever => Ttl::Forever,
            Remaining::Secs(s) => Ttl::Secs(s),
        };
        self.store.set(
            &self.keys.active(&token.id),
            &self.clock.now().to_rfc3339(),
            ttl,
        )?;
        Ok(())
    }

    /// Fail when the token has frozen from inactivity.
    pub fn check_active_timeout(&self, raw: &str) -> AuthResult<()> {
        let token = self.codec.parse(raw)?;
        self.check_active(&token)
    }

    /// Seconds until the token freezes (`Forever` = never, `Absent` =
    /// already frozen or unknown).
    pub fn active_remaining(&self, raw: &str) -> AuthResult<Remaining> {
        let Some(window) = self.config.active_timeout else {
            return Ok(Remaining::Forever);
        };
        let token = self.codec.parse(raw)?;
        let Some(last) = self.last_active(&token)? else {
            return Ok(Remaining::Absent);
        };
        let deadline = last + Duration::seconds(window as i64);
        Ok(Remaining::until(Some(deadline), self.clock.now()))
    }

    fn check_active(&self, token: &Token) -> AuthResult<()> {
        let Some(window) = self.config.active_timeout else {
            return Ok(());
        };
        let last = self.last_active(token)?.ok_or(AuthError::NotAuthenticated)?;
        if self.clock.now() > last + Duration::seconds(window as i64) {
            return Err(AuthError::NotAuthenticated);
        }
        Ok(())
    }

    fn last_active(&self, token: &Token) -> AuthResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get(&self.keys.active(&token.id))? else {
            return Ok(None);
        };
        let at = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| vendra_store::StoreError::Corrupt {
                key: self.keys.active(&token.id),
                message: e.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Some(at))
    }

    // ─── device sessions ─────────────────────────────────────────────────

    /// Live token ids for the principal, most-recent-last.
    pub fn tokens_of(&self, login_id: &LoginId, device: Option<&str>) -> AuthResult<Vec<String>> {
        Ok(self.devices.list_tokens(login_id, device)?)
    }

    pub fn last_token_of(
        &self,
        login_id: &LoginId,
        device: Option<&str>,
    ) -> AuthResult<Option<String>> {
        Ok(self.devices.last_token(login_id, device)?)
    }

    // ─── capability checks ───────────────────────────────────────────────

    pub fn capabilities(&self, login_id: &LoginId) -> AuthResult<CapabilitySet> {
        self.resolver.resolve(&self.config.login_type, login_id)
    }

    pub fn has_permission(&self, login_id: &LoginId, code: &str) -> AuthResult<bool> {
        Ok(self.capabilities(login_id)?.permissions.contains(code))
    }

    /// All listed codes present.
    pub fn has_permission_and(&self, login_id: &LoginId, codes: &[&str]) -> AuthResult<bool> {
        let caps = self.capabilities(login_id)?;
        Ok(codes.iter().all(|c| caps.permissions.contains(*c)))
    }

    /// At least one listed code present.
    pub fn has_permission_or(&self, login_id: &LoginId, codes: &[&str]) -> AuthResult<bool> {
        let caps = self.capabilities(login_id)?;
        Ok(codes.iter().any(|c| caps.permissions.contains(*c)))
    }

    pub fn check_permission(&self, login_id: &LoginId, code: &str) -> AuthResult<()> {
        self.check_permission_and(login_id, &[code])
    }

    pub fn check_permission_and(&self, login_id: &LoginId, codes: &[&str]) -> AuthResult<()> {
        let caps = self.capabilities(login_id)?;
        let missing = missing_codes(&caps.permissions, codes);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::NotPermission { missing })
        }
    }

    pub fn check_permission_or(&self, login_id: &LoginId, codes: &[&str]) -> AuthResult<()> {
        if self.has_permission_or(login_id, codes)? {
            Ok(())
        } else {
            Err(AuthError::NotPermission {
                missing: codes.iter().map(|c| c.to_string()).collect(),
            })
        }
    }

    pub fn has_role(&self, login_id: &LoginId, role: &str) -> AuthResult<bool> {
        Ok(self.capabilities(login_id)?.roles.contains(role))
    }

    pub fn has_role_and(&self, login_id: &LoginId, roles: &[&str]) -> AuthResult<bool> {
        let caps = self.capabilities(login_id)?;
        Ok(roles.iter().all(|r| caps.roles.contains(*r)))
    }

    pub fn has_role_or(&self, login_id: &LoginId, roles: &[&str]) -> AuthResult<bool> {
        let caps = self.capabilities(login_id)?;
        Ok(roles.iter().any(|r| caps.roles.contains(*r)))
    }

    pub fn check_role(&self, login_id: &LoginId, role: &str) -> AuthResult<()> {
        self.check_role_and(login_id, &[role])
    }

    pub fn check_role_and(&self, login_id: &LoginId, roles: &[&str]) -> AuthResult<()> {
        let caps = self.capabilities(login_id)?;
        let missing = missing_codes(&caps.roles, roles);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::NotRole { missing })
        }
    }

    pub fn check_role_or(&self, login_id: &LoginId, roles: &[&str]) -> AuthResult<()> {
        if self.has_role_or(login_id, roles)? {
            Ok(())
        } else {
            Err(AuthError::NotRole {
                missing: roles.iter().map(|r| r.to_string()).collect(),
            })
        }
    }

    // ─── step-up authentication ──────────────────────────────────────────

    /// Open a step-up window for the session behind `raw`.
    pub fn open_safe(&self, raw: &str, service: Option<&str>, duration: Ttl) -> AuthResult<()> {
        let subject = self.safe_subject(raw)?;
        self.safe
            .open(&subject, service.unwrap_or(DEFAULT_SAFE_SERVICE), duration)?;
        Ok(())
    }

    pub fn is_safe(&self, raw: &str, service: Option<&str>) -> AuthResult<bool> {
        let subject = self.safe_subject(raw)?;
        Ok(self
            .safe
            .is_open(&subject, service.unwrap_or(DEFAULT_SAFE_SERVICE))?)
    }

    pub fn check_safe(&self, raw: &str, service: Option<&str>) -> AuthResult<()> {
        let subject = self.safe_subject(raw)?;
        self.safe
            .check(&subject, service.unwrap_or(DEFAULT_SAFE_SERVICE))
    }

    pub fn safe_remaining(&self, raw: &str, service: Option<&str>) -> AuthResult<Remaining> {
        let subject = self.safe_subject(raw)?;
        Ok(self
            .safe
            .remaining(&subject, service.unwrap_or(DEFAULT_SAFE_SERVICE))?)
    }

    /// Close one service's window, or all of the session's windows.
    pub fn close_safe(&self, raw: &str, service: Option<&str>) -> AuthResult<()> {
        let subject = self.safe_subject(raw)?;
        Ok(self.safe.close(&subject, service)?)
    }

    fn safe_subject(&self, raw: &str) -> AuthResult<String> {
        let token = self.codec.parse(raw)?;
        Ok(match self.config.safe_subject {
            SafeSubject::Principal => token.login_id.as_string(),
            SafeSubject::Token => token.id,
        })
    }

    // ─── identity switching ──────────────────────────────────────────────

    /// Override the effective principal until the guard drops.
    pub fn switch_to(&self, login_id: LoginId) -> SwitchGuard {
        switch::switch_to(&self.config.login_type, login_id)
    }

    /// Run `operation` under a switched identity; the previous identity is
    /// restored on every exit path.
    pub fn with_switched_identity<R>(&self, login_id: LoginId, operation: impl FnOnce() -> R) -> R {
        switch::with_switched_identity(&self.config.login_type, login_id, operation)
    }

    pub fn is_switched(&self) -> bool {
        switch::is_switched(&self.config.login_type)
    }

    pub fn switched_login_id(&self) -> Option<LoginId> {
        switch::current(&self.config.login_type)
    }

    /// The identity the current call chain acts as: the innermost switch
    /// frame, or the authenticated principal.
    pub fn effective_login_id(&self, authenticated: &LoginId) -> LoginId {
        self.switched_login_id()
            .unwrap_or_else(|| authenticated.clone())
    }

    // ─── sessions / search ───────────────────────────────────────────────

    /// The principal's store-backed account session.
    pub fn session(&self, login_id: &LoginId) -> AccountSession {
        AccountSession::new(self.store.clone(), &self.keys, login_id, self.config.timeout)
    }

    /// Search live token validity markers by keyword.
    pub fn search_tokens(
        &self,
        keyword: &str,
        start: usize,
        count: i64,
        ascending: bool,
    ) -> AuthResult<Vec<String>> {
        Ok(search_keys(
            self.store.as_ref(),
            &self.keys.token_prefix(),
            keyword,
            start,
            count,
            ascending,
        )?)
    }

    /// Search account-session keys by keyword.
    pub fn search_sessions(
        &self,
        keyword: &str,
        start: usize,
        count: i64,
        ascending: bool,
    ) -> AuthResult<Vec<String>> {
        Ok(search_keys(
            self.store.as_ref(),
            &self.keys.session_prefix(),
            keyword,
            start,
            count,
            ascending,
        )?)
    }
}

fn min_remaining(a: Remaining, b: Remaining) -> Remaining {
    match (a, b) {
        (Remaining::Absent, _) | (_, Remaining::Absent) => Remaining::Absent,
        (Remaining::Forever, other) | (other, Remaining::Forever) => other,
        (Remaining::Secs(x), Remaining::Secs(y)) => Remaining::Secs(x.min(y)),
    }
}

fn missing_codes(held: &HashSet<String>, wanted: &[&str]) -> Vec<String> {
    wanted
        .iter()
        .filter(|code| !held.contains(**code))
        .map(|code| code.to_string())
        .collect()
}
