//! Frame builders for tests and benches.
//!
//! Produces well-formed Ethernet II frames carrying IPv4/IPv6 with a TCP or
//! UDP header. Checksums are left zero; nothing in this crate verifies them.

use std::net::Ipv6Addr;

use bytes::{BufMut, BytesMut};
use flowvakt_core::packet::TransportProtocol;

use crate::ethernet::{ETH_P_IP, ETH_P_IPV6};
use crate::ip::{IPV4_MIN_HDR_LEN, IPV6_HDR_LEN};
use crate::transport::{TCP_HDR_LEN, UDP_HDR_LEN};

pub const TCP_FLAG_FIN: u8 = 0x01;
pub const TCP_FLAG_SYN: u8 = 0x02;
pub const TCP_FLAG_PSH: u8 = 0x08;
pub const TCP_FLAG_ACK: u8 = 0x10;

pub const IPPROTO_ICMP: u8 = 1;

/// Shortest frame a NIC puts on the wire (without FCS).
pub const ETH_MIN_FRAME_LEN: usize = 60;

pub const UNICAST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
pub const BROADCAST_MAC: [u8; 6] = [0xff; 6];
pub const MULTICAST_MAC: [u8; 6] = [0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb];

const SOURCE_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

#[derive(Clone, Copy, Debug)]
enum Addresses {
    V4([u8; 4], [u8; 4]),
    V6(Ipv6Addr, Ipv6Addr),
}

#[derive(Clone, Debug)]
pub struct FrameBuilder {
    destination_mac: [u8; 6],
    ether_type: Option<u16>,
    addresses: Addresses,
    transport: TransportProtocol,
    ip_protocol: u8,
    ipv4_options: usize,
    src_port: u16,
    dst_port: u16,
    tcp_flags: u8,
    payload_len: usize,
    pad: bool,
}

impl FrameBuilder {
    fn new(addresses: Addresses, transport: TransportProtocol, src_port: u16, dst_port: u16) -> Self {
        Self {
            destination_mac: UNICAST_MAC,
            ether_type: None,
            addresses,
            transport,
            ip_protocol: transport.number(),
            ipv4_options: 0,
            src_port,
            dst_port,
            tcp_flags: 0,
            payload_len: 0,
            pad: true,
        }
    }

    pub fn tcp_v4(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> Self {
        Self::new(
            Addresses::V4(src, dst),
            TransportProtocol::Tcp,
            src_port,
            dst_port,
        )
    }

    pub fn udp_v4(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> Self {
        Self::new(
            Addresses::V4(src, dst),
            TransportProtocol::Udp,
            src_port,
            dst_port,
        )
    }

    pub fn tcp_v6(src: Ipv6Addr, src_port: u16, dst: Ipv6Addr, dst_port: u16) -> Self {
        Self::new(
            Addresses::V6(src, dst),
            TransportProtocol::Tcp,
            src_port,
            dst_port,
        )
    }

    pub fn udp_v6(src: Ipv6Addr, src_port: u16, dst: Ipv6Addr, dst_port: u16) -> Self {
        Self::new(
            Addresses::V6(src, dst),
            TransportProtocol::Udp,
            src_port,
            dst_port,
        )
    }

    pub fn destination_mac(mut self, mac: [u8; 6]) -> Self {
        self.destination_mac = mac;
        self
    }

    /// Overrides the EtherType written in the link header.
    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = Some(ether_type);
        self
    }

    /// Overrides the protocol number in the IP header; the transport header
    /// written is unchanged.
    pub fn ip_protocol(mut self, protocol: u8) -> Self {
        self.ip_protocol = protocol;
        self
    }

    /// Appends `len` bytes of IPv4 options (rounded up to a multiple of 4).
    pub fn ipv4_options(mut self, len: usize) -> Self {
        self.ipv4_options = len.div_ceil(4) * 4;
        self
    }

    pub fn tcp_flags(mut self, flags: u8) -> Self {
        self.tcp_flags = flags;
        self
    }

    pub fn payload(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    /// Skips padding to the Ethernet minimum frame size.
    pub fn unpadded(mut self) -> Self {
        self.pad = false;
        self
    }

    pub fn build(&self) -> BytesMut {
        let transport_len = match self.transport {
            TransportProtocol::Tcp => TCP_HDR_LEN,
            TransportProtocol::Udp => UDP_HDR_LEN,
        };
        let l4_len = transport_len + self.payload_len;

        let mut frame = BytesMut::with_capacity(ETH_MIN_FRAME_LEN.max(14 + 60 + l4_len));
        frame.put_slice(&self.destination_mac);
        frame.put_slice(&SOURCE_MAC);

        match self.addresses {
            Addresses::V4(src, dst) => {
                frame.put_u16(self.ether_type.unwrap_or(ETH_P_IP));
                let header_len = IPV4_MIN_HDR_LEN + self.ipv4_options;
                frame.put_u8(0x40 | (header_len / 4) as u8);
                frame.put_u8(0); // DSCP/ECN
                frame.put_u16((header_len + l4_len) as u16);
                frame.put_u16(0); // identification
                frame.put_u16(0x4000); // don't fragment
                frame.put_u8(64); // TTL
                frame.put_u8(self.ip_protocol);
                frame.put_u16(0); // checksum
                frame.put_slice(&src);
                frame.put_slice(&dst);
                frame.put_bytes(0, self.ipv4_options);
            }
            Addresses::V6(src, dst) => {
                frame.put_u16(self.ether_type.unwrap_or(ETH_P_IPV6));
                frame.put_u32(0x6000_0000);
                frame.put_u16(l4_len as u16);
                frame.put_u8(self.ip_protocol);
                frame.put_u8(64); // hop limit
                frame.put_slice(&src.octets());
                frame.put_slice(&dst.octets());
                debug_assert_eq!(frame.len(), 14 + IPV6_HDR_LEN);
            }
        }

        frame.put_u16(self.src_port);
        frame.put_u16(self.dst_port);
        match self.transport {
            TransportProtocol::Tcp => {
                frame.put_u32(0); // sequence
                frame.put_u32(0); // acknowledgment
                frame.put_u8(0x50); // data offset: 5 words
                frame.put_u8(self.tcp_flags);
                frame.put_u16(u16::MAX); // window
                frame.put_u16(0); // checksum
                frame.put_u16(0); // urgent pointer
            }
            TransportProtocol::Udp => {
                frame.put_u16(l4_len as u16);
                frame.put_u16(0); // checksum
            }
        }
        frame.put_bytes(0, self.payload_len);

        if self.pad && frame.len() < ETH_MIN_FRAME_LEN {
            let missing = ETH_MIN_FRAME_LEN - frame.len();
            frame.put_bytes(0, missing);
        }
        frame
    }
}
