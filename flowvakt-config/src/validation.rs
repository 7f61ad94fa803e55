//! Custom validation functions for configuration.

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

use crate::capture::CaptureConfig;

/// IFNAMSIZ minus the trailing NUL.
const MAX_INTERFACE_LEN: usize = 15;

static INTERFACE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.\-]+$").ok());

/// Validate that an interface name follows Linux naming conventions.
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    let re = INTERFACE_NAME
        .as_ref()
        .ok_or_else(|| ValidationError::new("invalid_regex"))?;

    if name.len() <= MAX_INTERFACE_LEN && re.is_match(name) && name != "." && name != ".." {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_ascii_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// A capture with neither direction attached observes nothing.
pub fn validate_directions(capture: &CaptureConfig) -> Result<(), ValidationError> {
    if capture.ingress || capture.egress {
        Ok(())
    } else {
        let mut error = ValidationError::new("no_direction");
        error.message = Some("at least one of ingress/egress must be enabled".into());
        Err(error)
    }
}
