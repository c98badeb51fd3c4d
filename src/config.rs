//! Liveness configuration for the metadata service.
//!
//! Mirrors the deployment knobs that drive host classification: how often
//! hosts heartbeat, how many missed periods mark a host offline, and how
//! long an offline host is kept before its record is removed.
//!
//! Sources, lowest to highest precedence: built-in defaults, a TOML
//! fragment, `CANOPY_*` environment variables.

use serde::{Deserialize, Serialize};

/// Tunables for host liveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Expected interval between host heartbeats, in seconds.
    pub heartbeat_interval_secs: u32,
    /// Missed heartbeat periods before a host is considered offline.
    pub expired_time_factor: u32,
    /// Seconds without a heartbeat before a host record is removed.
    pub removed_threshold_secs: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 10,
            expired_time_factor: 2,
            removed_threshold_secs: 24 * 60 * 60,
        }
    }
}

impl LivenessConfig {
    /// Parse a TOML fragment, falling back to defaults for absent fields.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `CANOPY_HEARTBEAT_INTERVAL_SECS`, `CANOPY_EXPIRED_TIME_FACTOR`
    /// and `CANOPY_REMOVED_THRESHOLD_SECS` overrides when set and parseable.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_u32("CANOPY_HEARTBEAT_INTERVAL_SECS") {
            self.heartbeat_interval_secs = v;
        }
        if let Some(v) = env_u32("CANOPY_EXPIRED_TIME_FACTOR") {
            self.expired_time_factor = v;
        }
        if let Some(v) = env_u32("CANOPY_REMOVED_THRESHOLD_SECS") {
            self.removed_threshold_secs = v;
        }
        self
    }

    /// Milliseconds below which a heartbeat age means ONLINE.
    pub fn online_window_ms(&self) -> i64 {
        i64::from(self.heartbeat_interval_secs) * i64::from(self.expired_time_factor) * 1000
    }

    /// Milliseconds at or above which a host record is removed.
    pub fn removed_threshold_ms(&self) -> i64 {
        i64::from(self.removed_threshold_secs) * 1000
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
