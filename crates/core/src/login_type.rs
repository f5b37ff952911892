use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Principal-type key used to select a kernel in the registry.
///
/// Opaque at this layer (e.g. "admin", "member"); each registered type owns
/// an independently configured kernel so token namespaces never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginType(Cow<'static, str>);

impl LoginType {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LoginType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for LoginType {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}
