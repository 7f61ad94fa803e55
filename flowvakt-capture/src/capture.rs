use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use flowvakt_config::CaptureConfig;
use flowvakt_core::packet::Direction;
use pcap::{Active, Capture, Device};
use tracing::{debug, info};

use crate::error::CaptureError;
use crate::frame::Frame;

/// A capture device as reported by libpcap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: Option<String>,
    pub addresses: Vec<IpAddr>,
    pub up: bool,
    pub loopback: bool,
}

impl From<Device> for InterfaceInfo {
    fn from(device: Device) -> Self {
        InterfaceInfo {
            up: device.flags.is_up(),
            loopback: device.flags.is_loopback(),
            addresses: device.addresses.iter().map(|a| a.addr).collect(),
            description: device.desc,
            name: device.name,
        }
    }
}

/// Lists capture devices.
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>, CaptureError> {
    Ok(Device::list()?
        .into_iter()
        .map(InterfaceInfo::from)
        .collect())
}

/// Maps a pipeline direction onto the kernel's capture direction filter.
pub fn pcap_direction(direction: Direction) -> pcap::Direction {
    match direction {
        Direction::Inbound => pcap::Direction::In,
        Direction::Outbound => pcap::Direction::Out,
    }
}

/// A live, direction-filtered capture on one interface.
pub struct LiveCapture {
    capture: Capture<Active>,
    interface: String,
    direction: Direction,
}

impl LiveCapture {
    /// Opens `config.interface` and restricts it to frames travelling in
    /// `direction`.
    pub fn open(config: &CaptureConfig, direction: Direction) -> Result<Self, CaptureError> {
        let devices = Device::list()?;
        let available: Vec<String> = devices.iter().map(|d| d.name.clone()).collect();
        let device = devices
            .into_iter()
            .find(|d| d.name == config.interface)
            .ok_or_else(|| CaptureError::DeviceNotFound {
                name: config.interface.clone(),
                available,
            })?;

        let buffer_size =
            i32::try_from(config.buffer_size).map_err(|_| CaptureError::InvalidSetting {
                setting: "buffer_size",
                value: config.buffer_size,
            })?;

        let capture = Capture::from_device(device)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .buffer_size(buffer_size)
            .timeout(config.timeout_ms)
            .immediate_mode(true)
            .open()?;
        capture.direction(pcap_direction(direction))?;

        info!(
            interface = %config.interface,
            %direction,
            snaplen = config.snaplen,
            "Capture attached"
        );

        Ok(LiveCapture {
            capture,
            interface: config.interface.clone(),
            direction,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Delivers frames to `callback` until `terminate` is set or the capture
    /// fails. Returns the number of frames delivered.
    ///
    /// `terminate` is polled at least once per read timeout.
    pub fn run<F>(&mut self, terminate: &AtomicBool, mut callback: F) -> Result<u64, CaptureError>
    where
        F: FnMut(Frame<'_>),
    {
        let mut delivered = 0u64;
        while !terminate.load(Ordering::Relaxed) {
            match self.capture.next_packet() {
                Ok(packet) => {
                    callback(Frame::new(packet.data, packet.header.len));
                    delivered += 1;
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if let Ok(stats) = self.capture.stats() {
            debug!(
                interface = %self.interface,
                direction = %self.direction,
                received = stats.received,
                dropped = stats.dropped,
                if_dropped = stats.if_dropped,
                "Capture detached"
            );
        }
        Ok(delivered)
    }
}
