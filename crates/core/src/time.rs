//! Lifetime encodings shared by the kernel and the store.
//!
//! The wire/store convention is inherited from the upstream protocol:
//! `-1` means "forever" and `-2` means "no such value". Inside the process
//! both are explicit enum variants so arithmetic can never misread a
//! sentinel as a duration.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A requested lifetime: a bounded number of seconds, or forever.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Ttl {
    Secs(u64),
    Forever,
}

impl Ttl {
    /// Deadline this lifetime produces when started at `from`.
    /// `None` means the value never expires.
    pub fn deadline(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Ttl::Secs(s) => Some(from + Duration::seconds(*s as i64)),
            Ttl::Forever => None,
        }
    }

    pub fn as_secs_i64(&self) -> i64 {
        match self {
            Ttl::Secs(s) => *s as i64,
            Ttl::Forever => -1,
        }
    }

    pub fn is_forever(&self) -> bool {
        matches!(self, Ttl::Forever)
    }
}

impl From<i64> for Ttl {
    fn from(value: i64) -> Self {
        if value < 0 {
            Ttl::Forever
        } else {
            Ttl::Secs(value as u64)
        }
    }
}

impl From<Ttl> for i64 {
    fn from(value: Ttl) -> Self {
        value.as_secs_i64()
    }
}

/// Remaining lifetime of a stored value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Remaining {
    Secs(u64),
    Forever,
    /// The value does not exist (or has already expired).
    Absent,
}

impl Remaining {
    /// Remaining time until `deadline`, evaluated at `now`.
    pub fn until(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match deadline {
            None => Remaining::Forever,
            Some(at) if at <= now => Remaining::Absent,
            Some(at) => Remaining::Secs((at - now).num_seconds().max(0) as u64),
        }
    }

    pub fn as_secs_i64(&self) -> i64 {
        match self {
            Remaining::Secs(s) => *s as i64,
            Remaining::Forever => -1,
            Remaining::Absent => -2,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Remaining::Absent)
    }
}

impl From<i64> for Remaining {
    fn from(value: i64) -> Self {
        match value {
            -1 => Remaining::Forever,
            v if v < 0 => Remaining::Absent,
            v => Remaining::Secs(v as u64),
        }
    }
}

impl From<Remaining> for i64 {
    fn from(value: Remaining) -> Self {
        value.as_secs_i64()
    }
}
