//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Default log level; `RUST_LOG` takes precedence.
    #[validate(custom(function = validation::validate_log_level))]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Interval between flow table reports (seconds).
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_report_interval() -> u64 {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            report_interval_secs: default_report_interval(),
        }
    }
}
