use pnet::packet::arp::{ArpOperations, ArpPacket};
use pnet::packet::ethernet::EtherTypes;

use crate::router::Router;
use crate::{InterfaceId, RxError, RxResult};

use super::send_reply;

/// Parses and handles one incoming Arp message.
pub fn input(router: &mut Router, interface: InterfaceId, payload: &[u8]) -> RxResult {
    if payload.len() < ArpPacket::minimum_packet_size() {
        return Err(RxError::InvalidLength);
    }
    let pkg = ArpPacket::new(payload).ok_or(RxError::InvalidLength)?;

    if pkg.get_protocol_type() != EtherTypes::Ipv4 {
        return Err(RxError::InvalidContent);
    }
    if pkg.get_hw_addr_len() != 6 || pkg.get_proto_addr_len() != 4 {
        return Err(RxError::InvalidContent);
    }

    match pkg.get_operation() {
        ArpOperations::Request => request_arrives(router, interface, &pkg),
        ArpOperations::Reply => reply_arrives(router, interface, &pkg),
        op => Err(RxError::NoListener(format!("Arp: no listener for operation {}", op.0))),
    }
}

/// Answers a request for one of our addresses and learns the requester.
fn request_arrives(router: &mut Router, interface: InterfaceId, pkg: &ArpPacket) -> RxResult {
    let address = match router.interface(interface).ipv4() {
        Some(net) => net.ip(),
        None => return Ok(()),
    };
    if pkg.get_target_proto_addr() != address {
        return Ok(());
    }

    let sender_mac = pkg.get_sender_hw_addr();
    let sender_ip = pkg.get_sender_proto_addr();
    debug!("Sending arp reply for {} to {}", address, sender_mac);
    if let Err(e) = send_reply(router, interface, sender_mac, sender_ip) {
        warn!("Unable to send arp reply: {}", e);
    }
    // The requester told us its own mapping, keep it.
    router.arp_table_mut().insert(interface, sender_ip, sender_mac);
    Ok(())
}

/// Learns the sender of a reply. Replies are not matched against pending
/// requests, so unsolicited replies update the table as well.
fn reply_arrives(router: &mut Router, interface: InterfaceId, pkg: &ArpPacket) -> RxResult {
    if router.interface(interface).ipv4().is_none() {
        return Ok(());
    }
    let sender_ip = pkg.get_sender_proto_addr();
    let sender_mac = pkg.get_sender_hw_addr();
    debug!("Arp reply maps {} => {}", sender_ip, sender_mac);
    router.arp_table_mut().insert(interface, sender_ip, sender_mac);
    Ok(())
}
