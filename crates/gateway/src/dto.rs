//! Response envelope and auth-error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use vendra_auth::AuthError;

/// Uniform result envelope every endpoint answers with.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: 500,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Render a kernel error with a status and a stable error code, so clients
/// can distinguish re-login from step-up prompts from ban notices.
pub fn auth_error_response(err: &AuthError) -> Response {
    let (status, code) = match err {
        AuthError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
        AuthError::TokenMalformed(_) => (StatusCode::UNAUTHORIZED, "token_malformed"),
        AuthError::KickedOut => (StatusCode::UNAUTHORIZED, "kicked_out"),
        AuthError::Banned { .. } => (StatusCode::FORBIDDEN, "banned"),
        AuthError::NotPermission { .. } => (StatusCode::FORBIDDEN, "not_permission"),
        AuthError::NotRole { .. } => (StatusCode::FORBIDDEN, "not_role"),
        AuthError::SecondaryAuthRequired { .. } => {
            (StatusCode::FORBIDDEN, "secondary_auth_required")
        }
        AuthError::UnsupportedMode => (StatusCode::BAD_REQUEST, "unsupported_mode"),
        AuthError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
    };

    (
        status,
        Json(serde_json::json!({
            "code": status.as_u16(),
            "error": code,
            "message": err.to_string(),
        })),
    )
        .into_response()
}
