//! Subscription execution configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration applied to every event of every subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionConfig {
    /// Timeout for a per-event resolver in milliseconds. `0` disables it.
    pub field_timeout_ms: u64,
    /// Log every event at `trace` level.
    pub trace_events: bool,
    /// Attach a `code` extension to field errors.
    pub include_error_codes: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            field_timeout_ms: 30000,
            trace_events: false,
            include_error_codes: true,
        }
    }
}

impl SubscriptionConfig {
    /// Parses a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the resolver timeout, if enabled.
    pub fn field_timeout(&self) -> Option<Duration> {
        (self.field_timeout_ms > 0).then(|| Duration::from_millis(self.field_timeout_ms))
    }
}
