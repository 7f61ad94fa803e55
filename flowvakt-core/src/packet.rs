//! Per-packet classification record and its fixed wire layout.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Size of an encoded [`PacketRecord`].
pub const WIRE_LEN: usize = 53;

/// Which way a packet crossed the observation point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Arriving at the observing host (ingress hook).
    Inbound,
    /// Leaving the observing host (egress hook).
    Outbound,
}

impl Direction {
    #[inline]
    pub fn is_outbound(self) -> bool {
        matches!(self, Direction::Outbound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport protocols the classifier tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TransportProtocol {
    Tcp = 6,
    Udp = 17,
}

impl TransportProtocol {
    /// IANA protocol number.
    #[inline]
    pub const fn number(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            6 => Some(TransportProtocol::Tcp),
            17 => Some(TransportProtocol::Udp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportProtocol::Tcp => "tcp",
            TransportProtocol::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TCP control bits the tracker cares about. Always clear for UDP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
}

/// One classified packet.
///
/// Built once per packet by a pipeline, then either published on the event
/// bus or folded into the flow table. Addresses are always 128-bit; IPv4
/// sources arrive here already in IPv4-mapped form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub src_ip: Ipv6Addr,
    pub dst_ip: Ipv6Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: TransportProtocol,
    pub flags: TcpFlags,
    /// Monotonic nanoseconds at classification time.
    pub timestamp: u64,
    pub direction: Direction,
    /// Total frame length on the wire.
    pub length: u32,
}

impl PacketRecord {
    /// Whether this packet may open a new flow entry: a TCP SYN, or any UDP
    /// datagram.
    #[inline]
    pub fn is_flow_start(&self) -> bool {
        match self.protocol {
            TransportProtocol::Tcp => self.flags.syn,
            TransportProtocol::Udp => true,
        }
    }

    /// Encodes the record in its fixed layout.
    ///
    /// Layout: `src_ip[16] dst_ip[16] src_port[2] dst_port[2] protocol[1]
    /// syn[1] ack[1] fin[1] timestamp[8] outbound[1] length[4]`. Ports are
    /// in network byte order, timestamp and length are little-endian.
    pub fn to_wire(&self) -> [u8; WIRE_LEN] {
        let mut out = [0u8; WIRE_LEN];
        let mut buf = &mut out[..];
        buf.put_slice(&self.src_ip.octets());
        buf.put_slice(&self.dst_ip.octets());
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u8(self.protocol.number());
        buf.put_u8(self.flags.syn as u8);
        buf.put_u8(self.flags.ack as u8);
        buf.put_u8(self.flags.fin as u8);
        buf.put_u64_le(self.timestamp);
        buf.put_u8(self.direction.is_outbound() as u8);
        buf.put_u32_le(self.length);
        out
    }

    /// Decodes a record written by [`PacketRecord::to_wire`]. Trailing bytes
    /// are ignored.
    pub fn from_wire(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < WIRE_LEN {
            return Err(WireError::Truncated {
                expected: WIRE_LEN,
                actual: data.len(),
            });
        }

        let mut buf = &data[..WIRE_LEN];
        let src_ip = Ipv6Addr::from(buf.get_u128());
        let dst_ip = Ipv6Addr::from(buf.get_u128());
        let src_port = buf.get_u16();
        let dst_port = buf.get_u16();
        let number = buf.get_u8();
        let protocol =
            TransportProtocol::from_number(number).ok_or(WireError::UnknownProtocol(number))?;
        let flags = TcpFlags {
            syn: buf.get_u8() != 0,
            ack: buf.get_u8() != 0,
            fin: buf.get_u8() != 0,
        };
        let timestamp = buf.get_u64_le();
        let direction = if buf.get_u8() != 0 {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
        let length = buf.get_u32_le();

        Ok(Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
            flags,
            timestamp,
            direction,
            length,
        })
    }
}

/// Collapses IPv4-mapped addresses back to IPv4 for display.
pub fn display_addr(addr: Ipv6Addr) -> IpAddr {
    match addr.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(addr),
    }
}
