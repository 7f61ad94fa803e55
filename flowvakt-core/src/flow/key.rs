use std::fmt;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

use crate::packet::{display_addr, Direction, PacketRecord, TransportProtocol};

/// Identity of one bidirectional conversation.
///
/// "Local" is always the observing host's own endpoint, so both directions
/// of a conversation map to the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowKey {
    pub local_ip: Ipv6Addr,
    pub remote_ip: Ipv6Addr,
    pub local_port: u16,
    pub remote_port: u16,
    pub protocol: TransportProtocol,
}

impl FlowKey {
    /// Key for a record, using the direction it was observed in.
    #[inline]
    pub fn from_record(record: &PacketRecord) -> Self {
        build_key(record, record.direction)
    }
}

/// Derives the canonical key for `record` as seen travelling `direction`.
///
/// Outbound packets were sent by the local endpoint, so their source is
/// local. Inbound packets were sent by the remote endpoint, so their
/// destination is local.
#[inline]
pub fn build_key(record: &PacketRecord, direction: Direction) -> FlowKey {
    match direction {
        Direction::Outbound => FlowKey {
            local_ip: record.src_ip,
            remote_ip: record.dst_ip,
            local_port: record.src_port,
            remote_port: record.dst_port,
            protocol: record.protocol,
        },
        Direction::Inbound => FlowKey {
            local_ip: record.dst_ip,
            remote_ip: record.src_ip,
            local_port: record.dst_port,
            remote_port: record.src_port,
            protocol: record.protocol,
        },
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {}:{} <-> {}:{}",
            self.protocol,
            display_addr(self.local_ip),
            self.local_port,
            display_addr(self.remote_ip),
            self.remote_port
        )
    }
}
