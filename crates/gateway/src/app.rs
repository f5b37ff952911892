//! Router construction and the login routing boundary.
//!
//! `/auth/login` maps the declared client id onto exactly one registered
//! principal type's login path, or rejects unknown clients; everything under
//! `/admin` and `/portal` runs behind that realm's bearer middleware.

use std::sync::Arc;

use axum::{
    Extension, Form, Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use vendra_auth::{
    AuthKernel, KernelConfig, KernelRegistry, NoCapabilities, Principal, TokenInfo,
};
use vendra_core::LoginId;
use vendra_store::SharedStore;

use crate::capability::{
    GatewayCapabilitySource, SESSION_PERMISSIONS_FIELD, SESSION_ROLES_FIELD,
    SessionCapabilityResolver,
};
use crate::credentials::{CredentialError, CredentialService, VerifiedAccount};
use crate::dto::{ApiResponse, auth_error_response};
use crate::middleware::{AuthState, BearerToken, auth_middleware};
use crate::{ADMIN_CLIENT_ID, ADMIN_LOGIN_TYPE, MEMBER_LOGIN_TYPE, PORTAL_CLIENT_ID};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub admin_signing_key: Vec<u8>,
    pub member_signing_key: Vec<u8>,
    pub key_prefix: String,
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<KernelRegistry>,
    pub credentials: Arc<dyn CredentialService>,
    pub capabilities: Arc<GatewayCapabilitySource>,
}

/// Build the full router (public entrypoint used by `main.rs` and tests).
pub fn build_app(
    store: Arc<dyn SharedStore>,
    credentials: Arc<dyn CredentialService>,
    config: GatewayConfig,
) -> Router {
    let admin_config = KernelConfig::new(ADMIN_LOGIN_TYPE, config.admin_signing_key)
        .with_key_prefix(config.key_prefix.clone())
        .with_claims_mode(true);
    let session_resolver = Arc::new(SessionCapabilityResolver::new(
        store.clone(),
        config.key_prefix.clone(),
        admin_config.timeout,
    ));

    let admin = AuthKernel::new(admin_config, store.clone(), session_resolver);
    let member = AuthKernel::new(
        KernelConfig::new(MEMBER_LOGIN_TYPE, config.member_signing_key)
            .with_key_prefix(config.key_prefix),
        store,
        Arc::new(NoCapabilities),
    );

    let registry = Arc::new(KernelRegistry::new().register(admin).register(member));

    let admin_auth = AuthState {
        kernel: registry
            .get(ADMIN_LOGIN_TYPE)
            .expect("admin kernel registered above")
            .clone(),
    };
    let member_auth = AuthState {
        kernel: registry
            .get(MEMBER_LOGIN_TYPE)
            .expect("member kernel registered above")
            .clone(),
    };

    let capabilities = Arc::new(GatewayCapabilitySource::new(
        registry.clone(),
        [ADMIN_LOGIN_TYPE.to_string()],
    ));

    let state = AppState {
        registry,
        credentials,
        capabilities,
    };

    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/capabilities", get(capabilities_for_proxy))
        .nest("/admin", realm_router(admin_auth))
        .nest("/portal", realm_router(member_auth))
        .with_state(state)
}

fn realm_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/auth/info", get(token_info))
        .route("/auth/logout", post(logout))
        .layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub username: String,
    pub password: String,
}

async fn login(State(state): State<AppState>, Form(params): Form<LoginParams>) -> Response {
    match params.client_id.as_str() {
        ADMIN_CLIENT_ID => realm_login(&state, ADMIN_LOGIN_TYPE, &params, true),
        PORTAL_CLIENT_ID => realm_login(&state, MEMBER_LOGIN_TYPE, &params, false),
        _ => {
            tracing::warn!(client_id = %params.client_id, "unrecognized client");
            ApiResponse::<()>::failed("clientId is incorrect").into_response()
        }
    }
}

fn realm_login(
    state: &AppState,
    login_type: &str,
    params: &LoginParams,
    pin_capabilities: bool,
) -> Response {
    let verified = match verify(state, login_type, params) {
        Ok(account) => account,
        Err(CredentialError::BadCredentials) => {
            return ApiResponse::<()>::failed("username or password is incorrect").into_response();
        }
        Err(CredentialError::Unavailable(message)) => {
            tracing::error!(%message, "credential service unavailable");
            return ApiResponse::<()>::failed("login service unavailable").into_response();
        }
    };

    let kernel = state
        .registry
        .get(login_type)
        .expect("login types are registered at startup");

    let info: TokenInfo = match kernel.login(verified.login_id.clone()) {
        Ok(info) => info,
        Err(e) => return auth_error_response(&e),
    };

    // The back-office realm resolves its codes from the session payload, so
    // pin them now and skip a delegate round trip on every check.
    if pin_capabilities {
        let session = kernel.session(&verified.login_id);
        let pinned = session
            .set(SESSION_PERMISSIONS_FIELD, json!(verified.permissions))
            .and_then(|()| session.set(SESSION_ROLES_FIELD, json!(verified.roles)));
        if let Err(e) = pinned {
            return auth_error_response(&e.into());
        }
    }

    ApiResponse::success(info).into_response()
}

fn verify(
    state: &AppState,
    login_type: &str,
    params: &LoginParams,
) -> Result<VerifiedAccount, CredentialError> {
    if login_type == ADMIN_LOGIN_TYPE {
        state.credentials.admin_login(&params.username, &params.password)
    } else {
        state.credentials.member_login(&params.username, &params.password)
    }
}

async fn token_info(
    Extension(kernel): Extension<Arc<AuthKernel>>,
    Extension(BearerToken(raw)): Extension<BearerToken>,
) -> Response {
    match kernel.token_info(&raw) {
        Ok(info) => ApiResponse::success(info).into_response(),
        Err(e) => auth_error_response(&e),
    }
}

async fn logout(
    Extension(kernel): Extension<Arc<AuthKernel>>,
    Extension(BearerToken(raw)): Extension<BearerToken>,
    Extension(principal): Extension<Principal>,
) -> Response {
    if let Err(e) = kernel.logout(&raw) {
        return auth_error_response(&e);
    }
    tracing::info!(login_id = %principal.login_id, "logged out");
    ApiResponse::success(()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CapabilityQuery {
    #[serde(rename = "loginType")]
    pub login_type: String,
    #[serde(rename = "loginId")]
    pub login_id: String,
}

/// Request-permission hook for the reverse proxy.
async fn capabilities_for_proxy(
    State(state): State<AppState>,
    Query(query): Query<CapabilityQuery>,
) -> Response {
    let login_id = match query.login_id.parse::<i64>() {
        Ok(n) => LoginId::Int(n),
        Err(_) => LoginId::Str(query.login_id.clone()),
    };

    match state.capabilities.permissions_for(&query.login_type, &login_id) {
        Ok(codes) => ApiResponse::success(codes).into_response(),
        Err(e) => auth_error_response(&e),
    }
}
