use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::Packet;

use crate::router::Router;
use crate::{arp, ipv4, InterfaceId, RxError, RxResult};

/// Parses one raw frame received on `interface` and hands the payload to
/// the protocol selected by the EtherType. Frames not addressed to the
/// interface MAC or the broadcast MAC are ignored.
pub fn input(router: &mut Router, interface: InterfaceId, frame: &[u8]) -> RxResult {
    if frame.len() < EthernetPacket::minimum_packet_size() {
        return Err(RxError::InvalidLength);
    }
    let pkg = EthernetPacket::new(frame).ok_or(RxError::InvalidLength)?;

    let mac = router.interface(interface).mac();
    let destination = pkg.get_destination();
    if destination != mac && !destination.is_broadcast() {
        return Ok(());
    }

    let ethertype = pkg.get_ethertype();
    debug!(
        "Received ethernet frame type {} from {} to {}",
        ethertype,
        pkg.get_source(),
        destination
    );

    match ethertype {
        EtherTypes::Arp => arp::input(router, interface, pkg.payload()),
        EtherTypes::Ipv4 => ipv4::input(router, interface, pkg.payload()),
        other => Err(RxError::NoListener(format!("Ethernet: no listener for {}", other))),
    }
}
