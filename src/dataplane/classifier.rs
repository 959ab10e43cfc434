//! Packet classifier
//!
//! Turns a punted frame into the addressing the decision engine needs.
//! Anything that is not a well-formed IPv4 frame yields `None`.

use crate::protocol::ethernet::Frame;
use crate::protocol::ipv4::Ipv4Header;
use crate::protocol::{EtherType, MacAddr};
use std::net::Ipv4Addr;
use tracing::trace;

/// L2/L3 addressing of a reactive IPv4 packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub ether_type: EtherType,
}

pub fn classify(data: &[u8]) -> Option<ClassifiedPacket> {
    let frame = match Frame::parse(data) {
        Ok(frame) => frame,
        Err(e) => {
            trace!(error = %e, "unparsable frame");
            return None;
        }
    };

    if frame.ethertype() != EtherType::Ipv4 as u16 {
        trace!(ethertype = frame.ethertype(), "not IPv4");
        return None;
    }

    let header = match Ipv4Header::parse(frame.payload()) {
        Ok(header) => header,
        Err(e) => {
            trace!(error = %e, "unparsable IPv4 header");
            return None;
        }
    };

    Some(ClassifiedPacket {
        src_mac: frame.src_mac(),
        dst_mac: frame.dst_mac(),
        src_ip: header.src_addr(),
        dst_ip: header.dst_addr(),
        ether_type: EtherType::Ipv4,
    })
}
