use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an authenticated account.
///
/// Different principal stores key their accounts differently (numeric primary
/// keys for members, string codes for back-office staff), so the id is a
/// tagged variant rather than an opaque string. Conversions are lossless:
/// asking a string-keyed id for its numeric form is an error, never a guess.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginId {
    Int(i64),
    Str(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginIdError {
    /// The id is string-keyed and does not parse as a number.
    #[error("login id '{0}' is not numeric")]
    NotNumeric(String),
}

impl LoginId {
    /// Numeric form of the id.
    ///
    /// Succeeds for `Int` ids and for `Str` ids whose full content parses as
    /// an `i64`; anything else is [`LoginIdError::NotNumeric`].
    pub fn as_i64(&self) -> Result<i64, LoginIdError> {
        match self {
            LoginId::Int(n) => Ok(*n),
            LoginId::Str(s) => s
                .parse::<i64>()
                .map_err(|_| LoginIdError::NotNumeric(s.clone())),
        }
    }

    /// String form of the id (always available).
    pub fn as_string(&self) -> String {
        match self {
            LoginId::Int(n) => n.to_string(),
            LoginId::Str(s) => s.clone(),
        }
    }
}

impl core::fmt::Display for LoginId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoginId::Int(n) => write!(f, "{n}"),
            LoginId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for LoginId {
    fn from(value: i64) -> Self {
        LoginId::Int(value)
    }
}

impl From<&str> for LoginId {
    fn from(value: &str) -> Self {
        LoginId::Str(value.to_string())
    }
}

impl From<String> for LoginId {
    fn from(value: String) -> Self {
        LoginId::Str(value)
    }
}

impl FromStr for LoginId {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LoginId::Str(s.to_string()))
    }
}
