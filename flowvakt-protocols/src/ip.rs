//! ## flowvakt-protocols::ip
//! IPv4/IPv6 header parsing into a single 128-bit address space.
//!
//! IPv4 addresses are rewritten into IPv4-mapped IPv6 form (`::ffff:a.b.c.d`)
//! so flow keys and records never branch on address family.

use std::net::Ipv6Addr;

use flowvakt_core::packet::TransportProtocol;

use crate::error::SkipReason;
use crate::ethernet::{parse_link, ETH_HDR_LEN, ETH_P_IP, ETH_P_IPV6};

pub const IPV4_MIN_HDR_LEN: usize = 20;
pub const IPV6_HDR_LEN: usize = 40;

const IPV4_PROTO_OFFSET: usize = 9;
const IPV4_SRC_OFFSET: usize = 12;
const IPV6_NEXT_HDR_OFFSET: usize = 6;
const IPV6_SRC_OFFSET: usize = 8;

/// Network-layer fields of a TCP or UDP packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkLayer {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub protocol: TransportProtocol,
    /// Offset of the transport header from the start of the frame.
    pub header_end: usize,
}

/// Embeds an IPv4 address into the low 32 bits of a 128-bit address, after
/// 80 zero bits and 16 one bits.
#[inline]
pub fn normalize_v4(octets: [u8; 4]) -> Ipv6Addr {
    let mut mapped = [0u8; 16];
    mapped[10] = 0xff;
    mapped[11] = 0xff;
    mapped[12..].copy_from_slice(&octets);
    Ipv6Addr::from(mapped)
}

/// Parses link and network layers of `frame`.
///
/// Skips anything that is not IPv4/IPv6 carrying TCP or UDP, and any frame
/// too short to hold the headers it declares.
pub fn parse_network_layer(frame: &[u8]) -> Result<NetworkLayer, SkipReason> {
    let link = parse_link(frame)?;

    match link.ether_type {
        ETH_P_IP => parse_ipv4(frame),
        ETH_P_IPV6 => parse_ipv6(frame),
        other => Err(SkipReason::UnsupportedEtherType(other)),
    }
}

fn parse_ipv4(frame: &[u8]) -> Result<NetworkLayer, SkipReason> {
    let header = frame
        .get(ETH_HDR_LEN..ETH_HDR_LEN + IPV4_MIN_HDR_LEN)
        .ok_or(SkipReason::TruncatedNetwork)?;

    let version = header[0] >> 4;
    let header_len = usize::from(header[0] & 0x0f) * 4;
    if version != 4 || header_len < IPV4_MIN_HDR_LEN {
        return Err(SkipReason::MalformedIpv4);
    }

    let header_end = ETH_HDR_LEN + header_len;
    if frame.len() < header_end {
        return Err(SkipReason::TruncatedNetwork);
    }

    let protocol = transport(header[IPV4_PROTO_OFFSET])?;
    let src = address_v4(&header[IPV4_SRC_OFFSET..IPV4_SRC_OFFSET + 4]);
    let dst = address_v4(&header[IPV4_SRC_OFFSET + 4..IPV4_SRC_OFFSET + 8]);

    Ok(NetworkLayer {
        src,
        dst,
        protocol,
        header_end,
    })
}

fn parse_ipv6(frame: &[u8]) -> Result<NetworkLayer, SkipReason> {
    let header = frame
        .get(ETH_HDR_LEN..ETH_HDR_LEN + IPV6_HDR_LEN)
        .ok_or(SkipReason::TruncatedNetwork)?;

    // Extension headers are not walked; only a direct TCP/UDP next header counts.
    let protocol = transport(header[IPV6_NEXT_HDR_OFFSET])?;
    let src = address_v6(&header[IPV6_SRC_OFFSET..IPV6_SRC_OFFSET + 16]);
    let dst = address_v6(&header[IPV6_SRC_OFFSET + 16..IPV6_SRC_OFFSET + 32]);

    Ok(NetworkLayer {
        src,
        dst,
        protocol,
        header_end: ETH_HDR_LEN + IPV6_HDR_LEN,
    })
}

#[inline]
fn transport(number: u8) -> Result<TransportProtocol, SkipReason> {
    TransportProtocol::from_number(number).ok_or(SkipReason::UnsupportedTransport(number))
}

#[inline]
fn address_v4(bytes: &[u8]) -> Ipv6Addr {
    normalize_v4([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn address_v6(bytes: &[u8]) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(bytes);
    Ipv6Addr::from(octets)
}
