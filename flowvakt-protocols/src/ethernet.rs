//! ## flowvakt-protocols::ethernet
//! Ethernet II header: destination cast type and EtherType.

use crate::error::SkipReason;

pub const ETH_HDR_LEN: usize = 14;
pub const ETH_P_IP: u16 = 0x0800;
pub const ETH_P_IPV6: u16 = 0x86DD;

const ETH_TYPE_OFFSET: usize = 12;

/// Delivery class of a frame, from its destination MAC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkCast {
    Unicast,
    Multicast,
    Broadcast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkHeader {
    pub cast: LinkCast,
    pub ether_type: u16,
}

/// Reads the link-layer header. Frames shorter than 14 bytes are skipped.
#[inline]
pub fn parse_link(frame: &[u8]) -> Result<LinkHeader, SkipReason> {
    let header = frame.get(..ETH_HDR_LEN).ok_or(SkipReason::TruncatedLink)?;

    let destination = &header[..6];
    let cast = if destination.iter().all(|&octet| octet == 0xff) {
        LinkCast::Broadcast
    } else if destination[0] & 0x01 != 0 {
        // I/G bit set: group address.
        LinkCast::Multicast
    } else {
        LinkCast::Unicast
    };

    let ether_type = u16::from_be_bytes([header[ETH_TYPE_OFFSET], header[ETH_TYPE_OFFSET + 1]]);

    Ok(LinkHeader { cast, ether_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(destination: [u8; 6], ether_type: u16) -> Vec<u8> {
        let mut frame = destination.to_vec();
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&ether_type.to_be_bytes());
        frame
    }

    #[test]
    fn classifies_destination_cast() {
        let unicast = parse_link(&frame([0x02, 0, 0, 0, 0, 2], ETH_P_IP)).unwrap();
        assert_eq!(unicast.cast, LinkCast::Unicast);
        assert_eq!(unicast.ether_type, ETH_P_IP);

        let multicast = parse_link(&frame([0x01, 0x00, 0x5e, 0, 0, 1], ETH_P_IP)).unwrap();
        assert_eq!(multicast.cast, LinkCast::Multicast);

        let broadcast = parse_link(&frame([0xff; 6], 0x0806)).unwrap();
        assert_eq!(broadcast.cast, LinkCast::Broadcast);
        assert_eq!(broadcast.ether_type, 0x0806);
    }

    #[test]
    fn short_frames_are_skipped() {
        assert_eq!(parse_link(&[]), Err(SkipReason::TruncatedLink));
        assert_eq!(parse_link(&[0u8; 13]), Err(SkipReason::TruncatedLink));
    }
}
