//! `vendra-core` — shared primitives for the session/authorization kernel.
//!
//! This crate contains **pure** types only (no storage, no transport).

pub mod clock;
pub mod login_id;
pub mod login_type;
pub mod time;

pub use clock::{Clock, ManualClock, SystemClock};
pub use login_id::{LoginId, LoginIdError};
pub use login_type::LoginType;
pub use time::{Remaining, Ttl};
