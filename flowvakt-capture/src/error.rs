use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Device '{name}' not found (available: {})", available.join(", "))]
    DeviceNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Capture setting {setting} out of range: {value}")]
    InvalidSetting { setting: &'static str, value: usize },

    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),
}
