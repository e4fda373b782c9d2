//! Time helpers for epoch-millisecond timestamps.
//!
//! Job and result records carry epoch-millisecond fields (`started_at`,
//! `ended_at`, ...). These helpers centralize the conversion so no call
//! site has to deal with `SystemTime` errors.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as milliseconds since the UNIX epoch.
///
/// A clock before the epoch collapses to 0 rather than erroring; the
/// engine only uses these values for bookkeeping, never for ordering.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
