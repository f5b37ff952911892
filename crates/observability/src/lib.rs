//! `vendra-observability` — process-wide logging setup.
//!
//! Auth decisions are security-relevant, so the gateway logs structured JSON
//! by default; field names (login_type, login_id, reason) come from the
//! kernel's tracing calls.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Calling this more
/// than once is a no-op.
pub fn init() {
    init_with_default_filter("info");
}

/// Like [`init`], but with an explicit fallback filter (used by tests that
/// want quieter output).
pub fn init_with_default_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
