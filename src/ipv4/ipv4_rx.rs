use std::net::Ipv4Addr;

use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{checksum, Ipv4Packet, MutableIpv4Packet};

use crate::nat::{self, NatDirection};
use crate::router::Router;
use crate::routing::Route;
use crate::util::BufferChain;
use crate::{icmp, InterfaceId, RxError, RxResult};

use super::ipv4_tx::{output_to_host, output_to_next_hop};
use super::IPV4_HEADER_SIZE;

/// Validates one IPv4 packet received on `interface` and either delivers it
/// locally or forwards it.
pub fn input(router: &mut Router, interface: InterfaceId, payload: &[u8]) -> RxResult {
    if router.interface(interface).ipv4().is_none() {
        return Err(RxError::NoIpv4Config);
    }
    if payload.len() < Ipv4Packet::minimum_packet_size() {
        return Err(RxError::InvalidLength);
    }
    let total_length = {
        let pkg = Ipv4Packet::new(payload).ok_or(RxError::InvalidLength)?;
        pkg.get_total_length() as usize
    };
    if total_length < IPV4_HEADER_SIZE || total_length > payload.len() {
        return Err(RxError::InvalidLength);
    }
    // Ethernet pads short frames, only the bytes the header claims count.
    let packet = &payload[..total_length];

    let (source, destination, protocol) = {
        let pkg = Ipv4Packet::new(packet).ok_or(RxError::InvalidLength)?;
        if pkg.get_version() != 4 {
            return Err(RxError::InvalidContent);
        }
        if pkg.get_header_length() != 5 {
            debug!("IP header options are not supported");
            return Err(RxError::InvalidContent);
        }
        if pkg.get_checksum() != checksum(&pkg) {
            return Err(RxError::InvalidChecksum);
        }
        (pkg.get_source(), pkg.get_destination(), pkg.get_next_level_protocol())
    };
    debug!(
        "Received IPv4 packet protocol {} from {} to {}",
        protocol, source, destination
    );

    if destination == Ipv4Addr::BROADCAST {
        return input_to_ours(router, interface, packet);
    }

    // The NAPT outside address is one of our own, so translation back to
    // the inside host must happen before the local/forward classification.
    if let Some(inside) = router.nat_inside() {
        let (outside, outside_addr) = {
            let nat = router.nat_endpoint(inside);
            (nat.outside, nat.outside_addr)
        };
        if interface == outside && destination == outside_addr {
            if let Some(proto) = nat::protocol_of(protocol, packet) {
                let mut translated = packet.to_vec();
                match nat::translate(
                    &mut translated,
                    proto,
                    NatDirection::Incoming,
                    router.nat_endpoint_mut(inside),
                ) {
                    Ok(()) => return forward(router, interface, &translated),
                    // Not a translated flow, the packet really is for us.
                    Err(RxError::NatUnavailable) => (),
                    Err(e) => return Err(e),
                }
            }
        }
    }

    if let Some(owner) = router.local_destination(destination) {
        return input_to_ours(router, owner, packet);
    }
    forward(router, interface, packet)
}

/// Hands a packet addressed to the router to the matching upper protocol.
/// `owner` is the interface whose address (or broadcast) matched.
fn input_to_ours(router: &mut Router, owner: InterfaceId, packet: &[u8]) -> RxResult {
    let (source, protocol) = {
        let pkg = Ipv4Packet::new(packet).ok_or(RxError::InvalidLength)?;
        (pkg.get_source(), pkg.get_next_level_protocol())
    };
    let local_addr = router
        .interface(owner)
        .ipv4()
        .map(|net| net.ip())
        .ok_or(RxError::NoIpv4Config)?;

    match protocol {
        IpNextHeaderProtocols::Icmp => {
            icmp::input(router, source, local_addr, &packet[IPV4_HEADER_SIZE..])
        }
        // The router is not a TCP endpoint.
        IpNextHeaderProtocols::Tcp => Ok(()),
        IpNextHeaderProtocols::Udp => {
            if let Err(e) = icmp::send_destination_unreachable(router, source, local_addr, packet) {
                warn!("Unable to send icmp destination unreachable: {}", e);
            }
            Ok(())
        }
        other => Err(RxError::NoListener(format!(
            "IPv4: no listener for protocol {}",
            other
        ))),
    }
}

/// Forwards a packet towards its destination: route lookup, TTL handling,
/// outbound NAPT on the way out of the outside interface, then delivery to
/// the destination host or the next hop gateway.
fn forward(router: &mut Router, interface: InterfaceId, packet: &[u8]) -> RxResult {
    let (source, destination, ttl, protocol) = {
        let pkg = Ipv4Packet::new(packet).ok_or(RxError::InvalidLength)?;
        (
            pkg.get_source(),
            pkg.get_destination(),
            pkg.get_ttl(),
            pkg.get_next_level_protocol(),
        )
    };

    let route = match router.fib().route(destination) {
        Some(route) => route,
        None => {
            debug!("No route to {}", destination);
            return Err(RxError::NoRoute(destination));
        }
    };

    if ttl <= 1 {
        let local_addr = router
            .interface(interface)
            .ipv4()
            .map(|net| net.ip())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        if let Err(e) = icmp::send_time_exceeded(router, source, local_addr, packet) {
            warn!("Unable to send icmp time exceeded: {}", e);
        }
        return Ok(());
    }

    let mut forwarded = packet.to_vec();
    {
        let mut pkg = MutableIpv4Packet::new(&mut forwarded[..]).unwrap();
        pkg.set_ttl(ttl - 1);
        pkg.set_checksum(0);
        let csum = checksum(&pkg.to_immutable());
        pkg.set_checksum(csum);
    }

    if let Some(inside) = router.nat_inside() {
        let outside = router.nat_endpoint(inside).outside;
        if router.egress_interface(route) == Some(outside) {
            if let Some(proto) = nat::protocol_of(protocol, &forwarded) {
                nat::translate(
                    &mut forwarded,
                    proto,
                    NatDirection::Outgoing,
                    router.nat_endpoint_mut(inside),
                )?;
            }
        }
    }

    let chain = BufferChain::from_vec(forwarded);
    match route {
        Route::Connected(egress) => {
            output_to_host(router, egress, destination, chain).map_err(RxError::from)
        }
        Route::Network(next_hop) => {
            output_to_next_hop(router, next_hop, chain).map_err(RxError::from)
        }
    }
}
