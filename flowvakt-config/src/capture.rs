//! Packet capture configuration.
//!
//! One interface, observed in either or both directions. Each enabled
//! direction gets its own capture handle.

use serde::{Deserialize, Deserializer, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Packet capture configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[validate(schema(function = validation::validate_directions))]
pub struct CaptureConfig {
    /// Network interface for live capture.
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Run in promiscuous mode?
    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Kernel capture buffer size in bytes.
    #[validate(range(min = 4096, max = 1073741824))]
    #[serde(default = "default_buffer_size", deserialize_with = "deserialize_size")]
    pub buffer_size: usize,

    /// Bytes captured per frame. Headers only; the wire length is reported
    /// separately.
    #[validate(range(min = 96, max = 65535))]
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,

    /// Read timeout (milliseconds); bounds how long shutdown waits.
    #[validate(range(min = 1, max = 5000))]
    #[serde(default = "default_timeout")]
    pub timeout_ms: i32,

    /// Observe traffic arriving at the interface.
    #[serde(default = "default_true")]
    pub ingress: bool,

    /// Observe traffic leaving the interface.
    #[serde(default = "default_true")]
    pub egress: bool,
}

fn default_interface() -> String {
    "eth0".into()
}

fn default_promiscuous() -> bool {
    false
}

fn default_buffer_size() -> usize {
    1048576
}

fn default_snaplen() -> i32 {
    128
}

fn default_timeout() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Num(usize),
    Str(String),
}

/// Custom deserializer to allow human‑friendly sizes (e.g. "1MiB") or direct numbers.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Num(n) => Ok(n),
        SizeValue::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num_part, unit_part) = s.split_at(split);

    let number: f64 = num_part.parse().map_err(|e| format!("{e}: {s:?}"))?;
    let multiplier = match unit_part.trim().to_lowercase().as_str() {
        "kb" | "kib" => 1024.0,
        "mb" | "mib" => 1024.0 * 1024.0,
        "gb" | "gib" => 1024.0 * 1024.0 * 1024.0,
        "" | "b" => 1.0,
        other => return Err(format!("Unknown size unit: {other:?}")),
    };
    Ok((number * multiplier) as usize)
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            promiscuous: default_promiscuous(),
            buffer_size: default_buffer_size(),
            snaplen: default_snaplen(),
            timeout_ms: default_timeout(),
            ingress: true,
            egress: true,
        }
    }
}
