use std::net::Ipv4Addr;

use pnet::packet::ethernet::EtherTypes;
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{checksum, MutableIpv4Packet};

use crate::router::Router;
use crate::routing::Route;
use crate::util::BufferChain;
use crate::{arp, ethernet, InterfaceId, TxError, TxResult};

use super::{DEFAULT_TTL, IPV4_HEADER_SIZE};

/// Encapsulates `payload` in an IPv4 header and routes the packet towards
/// `destination`. This is how the router originates its own packets.
pub fn send(
    router: &mut Router,
    destination: Ipv4Addr,
    source: Ipv4Addr,
    payload: BufferChain,
    protocol: IpNextHeaderProtocol,
) -> TxResult {
    let total_length = IPV4_HEADER_SIZE + payload.len();
    if total_length > u16::MAX as usize {
        return Err(TxError::TooLargePayload);
    }

    let identification = router.next_identification();
    let mut header = vec![0; IPV4_HEADER_SIZE];
    {
        let mut pkg = MutableIpv4Packet::new(&mut header[..]).unwrap();
        pkg.set_version(4);
        pkg.set_header_length(5); // no option fields
        pkg.set_total_length(total_length as u16);
        pkg.set_identification(identification);
        pkg.set_ttl(DEFAULT_TTL);
        pkg.set_next_level_protocol(protocol);
        pkg.set_source(source);
        pkg.set_destination(destination);
        let csum = checksum(&pkg.to_immutable());
        pkg.set_checksum(csum);
    }

    let mut chain = payload;
    chain.prepend(header);
    output(router, destination, chain)
}

/// Routes an already encapsulated packet out of the router.
pub fn output(router: &mut Router, destination: Ipv4Addr, chain: BufferChain) -> TxResult {
    match router.fib().route(destination) {
        Some(Route::Connected(interface)) => output_to_host(router, interface, destination, chain),
        Some(Route::Network(next_hop)) => output_to_next_hop(router, next_hop, chain),
        None => {
            debug!("No route to {}", destination);
            Err(TxError::NoRoute(destination))
        }
    }
}

/// Delivers a packet to a host on the link of `interface`. On a missing Arp
/// entry the packet is dropped and the neighbor solicited; the sender is
/// expected to retransmit.
pub fn output_to_host(
    router: &mut Router,
    interface: InterfaceId,
    destination: Ipv4Addr,
    chain: BufferChain,
) -> TxResult {
    match router.arp_table().lookup(destination).copied() {
        Some(entry) => ethernet::send(router, entry.interface, entry.mac, chain, EtherTypes::Ipv4),
        None => {
            debug!("No arp entry for {}, soliciting and dropping packet", destination);
            if let Err(e) = arp::send_request(router, interface, destination) {
                warn!("Unable to send arp request: {}", e);
            }
            Err(TxError::NoArpEntry(destination))
        }
    }
}

/// Delivers a packet to its next hop gateway. When the gateway itself is
/// unresolved, the connected route covering it tells us where to solicit.
pub fn output_to_next_hop(router: &mut Router, next_hop: Ipv4Addr, chain: BufferChain) -> TxResult {
    match router.arp_table().lookup(next_hop).copied() {
        Some(entry) => ethernet::send(router, entry.interface, entry.mac, chain, EtherTypes::Ipv4),
        None => {
            match router.fib().route(next_hop) {
                Some(Route::Connected(interface)) => {
                    debug!("No arp entry for next hop {}, soliciting and dropping packet", next_hop);
                    if let Err(e) = arp::send_request(router, interface, next_hop) {
                        warn!("Unable to send arp request: {}", e);
                    }
                }
                _ => warn!("Next hop {} is not reachable", next_hop),
            }
            Err(TxError::NoArpEntry(next_hop))
        }
    }
}
