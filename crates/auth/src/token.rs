//! Signed bearer token creation and parsing.
//!
//! Tokens are self-describing: principal type and id, device, validity
//! window and (in claim-carrying mode) arbitrary extra claims all travel in
//! an HS256-signed payload. A successful parse proves integrity and freshness
//! only; "currently logged in" additionally requires the revocation and
//! device-binding checks in the kernel.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use vendra_core::{Clock, LoginId, LoginType, Ttl};

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    jti: String,
    #[serde(rename = "loginType")]
    login_type: String,
    #[serde(rename = "loginId")]
    login_id: LoginId,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<String>,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra: Option<Map<String, Value>>,
}

/// A parsed (or freshly issued) bearer token.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: String,
    pub login_type: LoginType,
    pub login_id: LoginId,
    pub device: Option<String>,
    pub issued_at: DateTime<Utc>,
    /// `None` = permanent token.
    pub expires_at: Option<DateTime<Utc>>,
    /// The signed wire form.
    pub value: String,
    extra: Option<Map<String, Value>>,
}

impl Token {
    /// Read one extra claim.
    ///
    /// Only tokens issued by a claim-carrying codec hold extras; on a plain
    /// token this is [`AuthError::UnsupportedMode`] regardless of the key.
    pub fn extra(&self, key: &str) -> AuthResult<Option<&Value>> {
        match &self.extra {
            Some(map) => Ok(map.get(key)),
            None => Err(AuthError::UnsupportedMode),
        }
    }

    /// All extra claims, when the token carries them.
    pub fn extras(&self) -> AuthResult<&Map<String, Value>> {
        self.extra.as_ref().ok_or(AuthError::UnsupportedMode)
    }
}

/// HS256 token codec for one kernel namespace.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    login_type: LoginType,
    claims_mode: bool,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(
        signing_key: &[u8],
        login_type: LoginType,
        claims_mode: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(signing_key),
            decoding: DecodingKey::from_secret(signing_key),
            login_type,
            claims_mode,
            clock,
        }
    }

    /// Sign a new token for `login_id`.
    ///
    /// `extra` must be empty unless the codec runs in claim-carrying mode.
    pub fn issue(
        &self,
        login_id: LoginId,
        device: Option<String>,
        timeout: Ttl,
        extra: Map<String, Value>,
    ) -> AuthResult<Token> {
        if !self.claims_mode && !extra.is_empty() {
            return Err(AuthError::UnsupportedMode);
        }

        let now = self.clock.now();
        let expires_at = timeout.deadline(now);
        let id = Uuid::now_v7().to_string();

        let claims = WireClaims {
            jti: id.clone(),
            login_type: self.login_type.as_str().to_string(),
            login_id: login_id.clone(),
            device: device.clone(),
            iat: now.timestamp(),
            exp: expires_at.map(|at| at.timestamp()),
            extra: self.claims_mode.then_some(extra),
        };

        let value = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenMalformed(e.to_string()))?;

        Ok(Token {
            id,
            login_type: self.login_type.clone(),
            login_id,
            device,
            issued_at: now,
            expires_at,
            extra: claims.extra,
            value,
        })
    }

    /// Verify signature and structure, then freshness.
    ///
    /// Expiry is evaluated against the injected clock (not the process
    /// clock), so simulated time governs it like every other deadline.
    pub fn parse(&self, raw: &str) -> AuthResult<Token> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<WireClaims>(raw, &self.decoding, &validation)
            .map_err(|e| AuthError::TokenMalformed(e.to_string()))?;
        let claims = data.claims;

        if claims.login_type != self.login_type.as_str() {
            return Err(AuthError::TokenMalformed(format!(
                "token was issued for login type '{}'",
                claims.login_type
            )));
        }

        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or_else(|| AuthError::TokenMalformed("iat out of range".to_string()))?;
        let expires_at = match claims.exp {
            Some(ts) => Some(
                Utc.timestamp_opt(ts, 0)
                    .single()
                    .ok_or_else(|| AuthError::TokenMalformed("exp out of range".to_string()))?,
            ),
            None => None,
        };

        if let Some(at) = expires_at {
            if self.clock.now() > at {
                return Err(AuthError::TokenExpired);
            }
        }

        Ok(Token {
            id: claims.jti,
            login_type: self.login_type.clone(),
            login_id: claims.login_id,
            device: claims.device,
            issued_at,
            expires_at,
            extra: claims.extra,
            value: raw.to_string(),
        })
    }
}
