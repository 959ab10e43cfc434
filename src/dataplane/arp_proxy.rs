//! Virtual gateway ARP responder
//!
//! Hosts use the virtual IP as their default gateway. Requests for it are
//! answered with the virtual MAC straight from the controller; everything
//! else is left to other ARP handlers.

use crate::platform::{ConnectPoint, OutboundPacket};
use crate::protocol::arp::{ArpOp, ArpPacket};
use crate::protocol::ethernet::{Frame, FrameBuilder};
use crate::protocol::{EtherType, MacAddr};
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// Build the reply to an ARP request for `virtual_ip`
///
/// Returns `None` when the frame is not an ARP request for that address.
pub fn answer_virtual_gateway(
    data: &[u8],
    received_from: &ConnectPoint,
    virtual_ip: Ipv4Addr,
    virtual_mac: MacAddr,
) -> Option<OutboundPacket> {
    let frame = Frame::parse(data).ok()?;
    if frame.ethertype() != EtherType::Arp as u16 {
        return None;
    }

    let request = match ArpPacket::parse(frame.payload()) {
        Ok(packet) => packet,
        Err(e) => {
            trace!(error = %e, "unparsable ARP payload");
            return None;
        }
    };
    if request.operation != ArpOp::Request || request.target_ip != virtual_ip {
        return None;
    }

    let reply = request.answer(virtual_mac);
    debug!(
        requester = %request.sender_ip,
        requester_mac = %request.sender_mac,
        %virtual_ip,
        "answering ARP for virtual gateway"
    );

    let mut builder = FrameBuilder::new()
        .dst_mac(request.sender_mac)
        .src_mac(virtual_mac);
    if let Some(tag) = frame.vlan_tag() {
        builder = builder.vlan_tag(tag);
    }
    let data = builder
        .ethertype(EtherType::Arp as u16)
        .payload(&reply.to_bytes())
        .build();

    Some(OutboundPacket {
        output: received_from.clone(),
        data,
    })
}
