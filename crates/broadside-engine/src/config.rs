//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deployment policy knobs for the engine.
///
/// The engine's contract does not depend on any of these. They only
/// control housekeeping around abandoned sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sessions untouched for longer than this are evicted by the reaper.
    /// `None` disables eviction entirely.
    pub idle_timeout: Option<Duration>,

    /// How often the reaper scans the store.
    pub reap_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            reap_interval: Duration::from_secs(30),
        }
    }
}
