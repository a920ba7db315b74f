//! Scheduler Configuration
//!
//! Settings are plain data so they can come from code or from a JSON
//! document:
//!
//! ```json
//! { "host": "tokio", "isolatePanics": false }
//! ```
//!
//! Missing keys take their defaults.

use serde::{Deserialize, Serialize};

use crate::batch::HostKind;
use crate::error::ConfigError;

/// Per-thread scheduler settings, installed with
/// [`Runtime::configure`](crate::reactive::Runtime::configure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Where deferred flushes are scheduled.
    pub host: HostKind,

    /// Catch panics in observer callbacks and report them instead of
    /// unwinding through the scheduler.
    pub isolate_panics: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            host: HostKind::Microtask,
            isolate_panics: true,
        }
    }
}

impl SchedulerConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Use `host` for deferred flushes.
    pub fn with_host(mut self, host: HostKind) -> Self {
        self.host = host;
        self
    }

    /// Enable or disable panic isolation.
    pub fn with_isolate_panics(mut self, isolate: bool) -> Self {
        self.isolate_panics = isolate;
        self
    }
}
