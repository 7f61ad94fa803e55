use thiserror::Error;

/// Why a frame was not classified.
///
/// None of these are failures: a live interface routinely carries truncated,
/// broadcast and non-IP frames. The packet always continues unmodified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("Broadcast or multicast frame")]
    NotUnicast,
    #[error("Frame shorter than a link-layer header")]
    TruncatedLink,
    #[error("Frame shorter than its network-layer header")]
    TruncatedNetwork,
    #[error("Frame shorter than a transport-layer header")]
    TruncatedTransport,
    #[error("Unsupported EtherType {0:#06x}")]
    UnsupportedEtherType(u16),
    #[error("Malformed IPv4 header")]
    MalformedIpv4,
    #[error("Unsupported transport protocol {0}")]
    UnsupportedTransport(u8),
}

impl SkipReason {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotUnicast => "not_unicast",
            SkipReason::TruncatedLink => "truncated_link",
            SkipReason::TruncatedNetwork => "truncated_network",
            SkipReason::TruncatedTransport => "truncated_transport",
            SkipReason::UnsupportedEtherType(_) => "ether_type",
            SkipReason::MalformedIpv4 => "malformed_ipv4",
            SkipReason::UnsupportedTransport(_) => "transport_protocol",
        }
    }
}
