//! ## flowvakt-protocols::transport
//! TCP/UDP port and flag extraction.

use flowvakt_core::packet::{TcpFlags, TransportProtocol};
use flowvakt_core::time::Clock;

use crate::error::SkipReason;

pub const TCP_HDR_LEN: usize = 20;
pub const UDP_HDR_LEN: usize = 8;

/// Bytes a caller must have past the network header before classifying:
/// room for the larger of the two transport headers, whichever protocol the
/// packet actually carries.
pub const TRANSPORT_PROBE_LEN: usize = if TCP_HDR_LEN > UDP_HDR_LEN {
    TCP_HDR_LEN
} else {
    UDP_HDR_LEN
};

const TCP_FLAGS_OFFSET: usize = 13;
const TCP_FIN: u8 = 0x01;
const TCP_SYN: u8 = 0x02;
const TCP_ACK: u8 = 0x10;

/// Transport-layer fields of a classified packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportLayer {
    pub src_port: u16,
    pub dst_port: u16,
    pub flags: TcpFlags,
    /// Taken from `clock` at classification time.
    pub timestamp: u64,
}

/// Reads ports (and TCP flags) from the transport header at `offset`.
///
/// The header is still bounds-checked here, so a caller that skipped its
/// own probe gets a skip rather than a panic.
#[inline]
pub fn parse_transport(
    frame: &[u8],
    offset: usize,
    protocol: TransportProtocol,
    clock: &dyn Clock,
) -> Result<TransportLayer, SkipReason> {
    let header_len = match protocol {
        TransportProtocol::Tcp => TCP_HDR_LEN,
        TransportProtocol::Udp => UDP_HDR_LEN,
    };
    let header = offset
        .checked_add(header_len)
        .and_then(|end| frame.get(offset..end))
        .ok_or(SkipReason::TruncatedTransport)?;

    let src_port = u16::from_be_bytes([header[0], header[1]]);
    let dst_port = u16::from_be_bytes([header[2], header[3]]);

    let flags = match protocol {
        TransportProtocol::Tcp => {
            let bits = header[TCP_FLAGS_OFFSET];
            TcpFlags {
                syn: bits & TCP_SYN != 0,
                ack: bits & TCP_ACK != 0,
                fin: bits & TCP_FIN != 0,
            }
        }
        TransportProtocol::Udp => TcpFlags::default(),
    };

    Ok(TransportLayer {
        src_port,
        dst_port,
        flags,
        timestamp: clock.now_ns(),
    })
}
