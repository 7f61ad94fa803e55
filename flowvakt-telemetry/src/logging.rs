//! ## flowvakt-telemetry::logging
//! **Process-wide `tracing` subscriber**
//!
//! `RUST_LOG` wins over the configured level, so a single run can be turned
//! up to `trace` (one line per packet) without editing configuration.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init(default_level: &str) -> Result<(), InitError> {
        fmt()
            .with_env_filter(Self::filter(
                std::env::var(EnvFilter::DEFAULT_ENV).ok(),
                default_level,
            ))
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
    }

    fn filter(from_env: Option<String>, default_level: &str) -> EnvFilter {
        from_env
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .or_else(|| EnvFilter::try_new(default_level).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}
