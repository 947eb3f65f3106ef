//! Wall-clock helpers.
//!
//! Detection signals may carry their own timestamp; everything else defaults
//! to the current unix time in seconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
