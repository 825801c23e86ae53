mod common;

use std::net::Ipv4Addr;

use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, Ipv4Packet};
use pnet::packet::Packet;
use pnet::util::MacAddr;

use ripr::router::Router;

use crate::common::{
    add_interface, eth_frame, icmp_echo_packet, icmp_echo_request, udp_packet, TestInterface,
    IPV4_HEADER_SIZE,
};

const ROUTER_MAC: MacAddr = MacAddr(0x02, 0x42, 0xac, 0x11, 0x00, 0x02);
const NEIGHBOR_MAC: MacAddr = MacAddr(0x02, 0x42, 0xac, 0x11, 0x00, 0x03);
const ROUTER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
const NEIGHBOR_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 2);

fn router_with_neighbor() -> (Router, TestInterface) {
    let mut router = Router::new();
    let eth0 = add_interface(&mut router, "eth0", ROUTER_MAC);
    router
        .set_ip("eth0", ROUTER_IP, Ipv4Addr::new(255, 255, 255, 0))
        .unwrap();
    router.arp_table_mut().insert(0, NEIGHBOR_IP, NEIGHBOR_MAC);
    (router, eth0)
}

#[test]
fn echo_request_gets_answered() {
    let (mut router, eth0) = router_with_neighbor();

    let request = icmp_echo_request(NEIGHBOR_IP, ROUTER_IP, 0x1234, 7, 64, b"ping");
    eth0.inject
        .send(eth_frame(ROUTER_MAC, NEIGHBOR_MAC, EtherTypes::Ipv4, &request))
        .unwrap();
    assert_eq!(router.poll_all(), 1);

    let frame = eth0.sent_frame().expect("no echo reply sent");
    let eth_pkg = EthernetPacket::new(&frame).unwrap();
    assert_eq!(eth_pkg.get_destination(), NEIGHBOR_MAC);
    assert_eq!(eth_pkg.get_ethertype(), EtherTypes::Ipv4);

    let ip_pkg = Ipv4Packet::new(eth_pkg.payload()).unwrap();
    assert_eq!(ip_pkg.get_source(), ROUTER_IP);
    assert_eq!(ip_pkg.get_destination(), NEIGHBOR_IP);
    assert_eq!(ip_pkg.get_next_level_protocol(), IpNextHeaderProtocols::Icmp);
    assert_eq!(ip_pkg.get_checksum(), ipv4::checksum(&ip_pkg));

    let total_length = ip_pkg.get_total_length() as usize;
    let icmp_bytes = &eth_pkg.payload()[IPV4_HEADER_SIZE..total_length];
    let icmp_pkg = IcmpPacket::new(icmp_bytes).unwrap();
    assert_eq!(icmp_pkg.get_icmp_type(), IcmpTypes::EchoReply);
    assert_eq!(icmp_pkg.get_checksum(), icmp::checksum(&icmp_pkg));

    let echo = EchoReplyPacket::new(icmp_bytes).unwrap();
    assert_eq!(echo.get_identifier(), 0x1234);
    assert_eq!(echo.get_sequence_number(), 7);
    assert_eq!(echo.payload(), b"ping");
}

#[test]
fn echo_reply_is_consumed_silently() {
    let (mut router, eth0) = router_with_neighbor();

    let reply = icmp_echo_packet(NEIGHBOR_IP, ROUTER_IP, IcmpTypes::EchoReply, 0x42, 1, 64, b"pong");
    eth0.inject
        .send(eth_frame(ROUTER_MAC, NEIGHBOR_MAC, EtherTypes::Ipv4, &reply))
        .unwrap();
    router.poll_all();

    assert!(eth0.sent_frame().is_none());
}

#[test]
fn udp_to_router_yields_port_unreachable() {
    let (mut router, eth0) = router_with_neighbor();

    let datagram = udp_packet(NEIGHBOR_IP, ROUTER_IP, 5000, 7, 64, b"anyone there?");
    eth0.inject
        .send(eth_frame(ROUTER_MAC, NEIGHBOR_MAC, EtherTypes::Ipv4, &datagram))
        .unwrap();
    router.poll_all();

    let frame = eth0.sent_frame().expect("no icmp error sent");
    let eth_pkg = EthernetPacket::new(&frame).unwrap();
    let ip_pkg = Ipv4Packet::new(eth_pkg.payload()).unwrap();
    assert_eq!(ip_pkg.get_destination(), NEIGHBOR_IP);
    assert_eq!(ip_pkg.get_source(), ROUTER_IP);

    let total_length = ip_pkg.get_total_length() as usize;
    let icmp_bytes = &eth_pkg.payload()[IPV4_HEADER_SIZE..total_length];
    let icmp_pkg = IcmpPacket::new(icmp_bytes).unwrap();
    assert_eq!(icmp_pkg.get_icmp_type(), IcmpTypes::DestinationUnreachable);
    assert_eq!(icmp_pkg.get_icmp_code().0, 3);
    assert_eq!(icmp_pkg.get_checksum(), icmp::checksum(&icmp_pkg));

    // The error quotes the offending header plus eight payload bytes.
    let quoted = &icmp_bytes[8..];
    assert_eq!(quoted, &datagram[..IPV4_HEADER_SIZE + 8]);
}

#[test]
fn tcp_to_router_is_dropped_silently() {
    let (mut router, eth0) = router_with_neighbor();

    let segment = crate::common::ipv4_packet(
        NEIGHBOR_IP,
        ROUTER_IP,
        64,
        IpNextHeaderProtocols::Tcp,
        &[0; 20],
    );
    eth0.inject
        .send(eth_frame(ROUTER_MAC, NEIGHBOR_MAC, EtherTypes::Ipv4, &segment))
        .unwrap();
    router.poll_all();

    assert!(eth0.sent_frame().is_none());
}
