use std::net::Ipv4Addr;

use pnet::packet::arp::{ArpHardwareTypes, ArpOperation, ArpOperations, MutableArpPacket};
use pnet::packet::ethernet::EtherTypes;
use pnet::util::MacAddr;

use crate::router::Router;
use crate::util::BufferChain;
use crate::{ethernet, InterfaceId, TxError, TxResult};

use super::ARP_FRAME_PAYLOAD_LEN;

/// Broadcasts a request for `target_ip` out of `interface`. The interface
/// must have an IPv4 configuration to put in the sender fields.
pub fn send_request(router: &mut Router, interface: InterfaceId, target_ip: Ipv4Addr) -> TxResult {
    let (sender_mac, sender_ip) = sender_of(router, interface)?;
    debug!(
        "Sending arp request via {} for {}",
        router.interface(interface).name(),
        target_ip
    );
    let builder = ArpBuilder::new_request(sender_mac, sender_ip, target_ip);
    send(router, interface, MacAddr::broadcast(), builder)
}

/// Sends a unicast reply carrying our own mapping back to a requester.
pub fn send_reply(
    router: &mut Router,
    interface: InterfaceId,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> TxResult {
    let (sender_mac, sender_ip) = sender_of(router, interface)?;
    let builder = ArpBuilder::new_reply(sender_mac, sender_ip, target_mac, target_ip);
    send(router, interface, target_mac, builder)
}

fn sender_of(router: &Router, interface: InterfaceId) -> Result<(MacAddr, Ipv4Addr), TxError> {
    let iface = router.interface(interface);
    let net = iface
        .ipv4()
        .ok_or_else(|| TxError::Other(format!("no IPv4 address on {}", iface.name())))?;
    Ok((iface.mac(), net.ip()))
}

fn send(
    router: &mut Router,
    interface: InterfaceId,
    destination: MacAddr,
    mut builder: ArpBuilder,
) -> TxResult {
    let mut buffer = vec![0; ARP_FRAME_PAYLOAD_LEN];
    builder.build(&mut buffer[..]);
    ethernet::send(
        router,
        interface,
        destination,
        BufferChain::from_vec(buffer),
        EtherTypes::Arp,
    )
}

/// Struct building Arp messages for IPv4 over ethernet.
pub struct ArpBuilder {
    operation: ArpOperation,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
}

impl ArpBuilder {
    /// Constructs a new `ArpBuilder` able to construct request packets.
    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpBuilder {
            operation: ArpOperations::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::zero(),
            target_ip,
        }
    }

    /// Constructs a new `ArpBuilder` able to construct reply packets.
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        ArpBuilder {
            operation: ArpOperations::Reply,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Writes the message into `buffer`. Bytes past the 28 byte message are
    /// left as padding.
    pub fn build(&mut self, buffer: &mut [u8]) {
        let mut pkg = MutableArpPacket::new(buffer).unwrap();
        pkg.set_hardware_type(ArpHardwareTypes::Ethernet);
        pkg.set_protocol_type(EtherTypes::Ipv4);
        pkg.set_hw_addr_len(6);
        pkg.set_proto_addr_len(4);
        pkg.set_operation(self.operation);
        pkg.set_sender_hw_addr(self.sender_mac);
        pkg.set_sender_proto_addr(self.sender_ip);
        pkg.set_target_hw_addr(self.target_mac);
        pkg.set_target_proto_addr(self.target_ip);
    }
}
