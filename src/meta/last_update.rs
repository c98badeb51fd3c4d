//! Manager of the monotonic last-update timestamp.
//!
//! Clients cache metadata aggressively; the reserved last-update key lets
//! them detect staleness with a single read. Every committed mutation bumps
//! it after the data write, so a reader may briefly see new data under the
//! old timestamp, never the reverse.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{MetaError, MetaResult};
use crate::meta::keys;
use crate::meta::store::MetaStore;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Write the last-update timestamp.
pub fn update(store: &MetaStore, now_ms: i64) -> MetaResult<()> {
    store.put(vec![(
        keys::LAST_UPDATE_TIME_KEY.to_vec(),
        keys::last_update_val(now_ms),
    )])
}

/// Read the last-update timestamp; zero when never written.
pub fn get(store: &MetaStore) -> MetaResult<i64> {
    match store.get(keys::LAST_UPDATE_TIME_KEY) {
        Ok(val) => Ok(keys::parse_last_update(&val)?),
        Err(MetaError::NotFound) => Ok(0),
        Err(e) => Err(e),
    }
}
