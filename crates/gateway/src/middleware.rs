use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use vendra_auth::{AuthError, AuthKernel};

use crate::dto::auth_error_response;

/// Kernel a protected realm authenticates against.
#[derive(Clone)]
pub struct AuthState {
    pub kernel: Arc<AuthKernel>,
}

/// Raw bearer token of the current request (for logout/introspection
/// handlers downstream).
#[derive(Clone)]
pub struct BearerToken(pub String);

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| auth_error_response(&AuthError::NotAuthenticated))?
        .to_string();

    let principal = state
        .kernel
        .authenticate(&token)
        .map_err(|e| auth_error_response(&e))?;

    // Keep the inactivity window sliding on every authenticated request.
    state
        .kernel
        .touch(&token)
        .map_err(|e| auth_error_response(&e))?;

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(BearerToken(token));
    req.extensions_mut().insert(state.kernel.clone());

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
