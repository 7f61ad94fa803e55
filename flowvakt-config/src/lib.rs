//! # flowvakt Configuration System
//!
//! Layered configuration for the flow telemetry engine.
//!
//! ## Features
//! - **Unified Configuration**: one tree shared by every crate
//! - **Validation**: ranges and naming rules checked before anything starts
//! - **Environment Awareness**: per-environment overrides and `FLOWVAKT_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod core;
mod error;
mod telemetry;
mod validation;

pub use capture::CaptureConfig;
pub use core::{CoreConfig, EventBusConfig, FlowTableConfig};
pub use error::ConfigError;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/flowvakt.yaml";
const ENV_PREFIX: &str = "FLOWVAKT_";

/// Top‑level configuration container for all flowvakt components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct FlowvaktConfig {
    /// Event bus and flow table sizing.
    #[serde(default)]
    #[validate(nested)]
    pub core: CoreConfig,

    /// Interface and directions to observe.
    #[serde(default)]
    #[validate(nested)]
    pub capture: CaptureConfig,

    /// Logging and reporting.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl FlowvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/flowvakt.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<FLOWVAKT_ENV>.yaml` - Environment‑specific overrides.
    /// 4. `FLOWVAKT_*` environment variables, `__` separating sections.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(FlowvaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("FLOWVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, on top of defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment = Figment::from(Serialized::defaults(FlowvaktConfig::default()))
            .merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["ENV"]).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = FlowvaktConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("FLOWVAKT_CORE__EVENT_BUS__CAPACITY", "8192");
            let config = FlowvaktConfig::load().unwrap();
            assert_eq!(config.core.event_bus.capacity, 8192);
            Ok(())
        });
    }

    #[test]
    fn layered_files() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/flowvakt.yaml",
                r#"
capture:
  interface: br-lan
  buffer_size: 4MiB
  egress: false
core:
  flow_table:
    idle_timeout_secs: null
"#,
            )?;
            jail.create_file(
                "config/staging.yaml",
                "telemetry:\n  report_interval_secs: 30\n",
            )?;
            jail.set_env("FLOWVAKT_ENV", "staging");

            let config = FlowvaktConfig::load().unwrap();
            assert_eq!(config.capture.interface, "br-lan");
            assert_eq!(config.capture.buffer_size, 4 * 1024 * 1024);
            assert!(config.capture.ingress);
            assert!(!config.capture.egress);
            assert_eq!(config.core.flow_table.idle_timeout_secs, None);
            assert_eq!(config.core.flow_table.max_entries, 1 << 24);
            assert_eq!(config.telemetry.report_interval_secs, 30);
            Ok(())
        });
    }

    #[test]
    fn invalid_file_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "flowvakt.yaml",
                "capture:\n  ingress: false\n  egress: false\n",
            )?;
            let err = FlowvaktConfig::load_from_path("flowvakt.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            Ok(())
        });
    }

    #[test]
    fn missing_file() {
        let err = FlowvaktConfig::load_from_path("/nonexistent/flowvakt.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
