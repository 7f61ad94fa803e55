//! # flowvakt Frame Parsers
//!
//! Bounds-checked parsing of Ethernet frames down to the transport header.
//! Every parser returns `Err(SkipReason)` instead of panicking on short or
//! uninteresting input; callers treat that as "let the packet pass".

pub mod error;
pub mod ethernet;
pub mod ip;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod transport;

pub use error::SkipReason;
pub use ethernet::{parse_link, LinkCast, LinkHeader, ETH_HDR_LEN};
pub use ip::{normalize_v4, parse_network_layer, NetworkLayer};
pub use transport::{parse_transport, TransportLayer, TRANSPORT_PROBE_LEN};
