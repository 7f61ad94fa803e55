//! flowvakt‑capture
//!
//! Attachment points for the packet pipelines. Each observed direction of an
//! interface is its own pcap handle, filtered in the kernel by direction, so
//! ingress and egress can be started and stopped independently.

pub mod capture;
pub mod error;
pub mod frame;

pub use capture::{list_interfaces, InterfaceInfo, LiveCapture};
pub use error::CaptureError;
pub use frame::Frame;
