//! Helpers shared by the integration tests: a router wired to mock
//! channels, and builders for the frames injected into it.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::mpsc::{Receiver, Sender};

use pnet::packet::arp::{ArpHardwareTypes, ArpOperation, MutableArpPacket};
use pnet::packet::ethernet::{EtherType, EtherTypes, MutableEthernetPacket};
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes, MutableIcmpPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::{self, MutableIpv4Packet};
use pnet::packet::udp::{self, MutableUdpPacket};
use pnet::util::MacAddr;

use ripr::router::Router;
use ripr::testing;

pub const IPV4_HEADER_SIZE: usize = 20;
pub const ETHERNET_HEADER_SIZE: usize = 14;

/// The test side of one mock interface.
pub struct TestInterface {
    pub inject: Sender<Vec<u8>>,
    pub read: Receiver<Vec<u8>>,
}

impl TestInterface {
    /// The next frame the router transmitted, if any.
    pub fn sent_frame(&self) -> Option<Vec<u8>> {
        self.read.try_recv().ok()
    }
}

pub fn add_interface(router: &mut Router, name: &str, mac: MacAddr) -> TestInterface {
    let (channel, inject, read) = testing::channel();
    router.add_interface(name, mac, Box::new(channel)).unwrap();
    TestInterface { inject, read }
}

pub fn eth_frame(dst: MacAddr, src: MacAddr, ethertype: EtherType, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0; ETHERNET_HEADER_SIZE + payload.len()];
    {
        let mut pkg = MutableEthernetPacket::new(&mut buffer[..]).unwrap();
        pkg.set_destination(dst);
        pkg.set_source(src);
        pkg.set_ethertype(ethertype);
        pkg.set_payload(payload);
    }
    buffer
}

pub fn arp_message(
    operation: ArpOperation,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let mut buffer = vec![0; 28];
    {
        let mut pkg = MutableArpPacket::new(&mut buffer[..]).unwrap();
        pkg.set_hardware_type(ArpHardwareTypes::Ethernet);
        pkg.set_protocol_type(EtherTypes::Ipv4);
        pkg.set_hw_addr_len(6);
        pkg.set_proto_addr_len(4);
        pkg.set_operation(operation);
        pkg.set_sender_hw_addr(sender_mac);
        pkg.set_sender_proto_addr(sender_ip);
        pkg.set_target_hw_addr(target_mac);
        pkg.set_target_proto_addr(target_ip);
    }
    buffer
}

/// An IPv4 packet with a valid header checksum around an opaque payload.
pub fn ipv4_packet(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ttl: u8,
    protocol: IpNextHeaderProtocol,
    payload: &[u8],
) -> Vec<u8> {
    let mut buffer = vec![0; IPV4_HEADER_SIZE + payload.len()];
    buffer[IPV4_HEADER_SIZE..].copy_from_slice(payload);
    finish_ip_header(&mut buffer, src, dst, ttl, protocol);
    buffer
}

fn finish_ip_header(
    buffer: &mut [u8],
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ttl: u8,
    protocol: IpNextHeaderProtocol,
) {
    let total_length = buffer.len() as u16;
    let mut pkg = MutableIpv4Packet::new(buffer).unwrap();
    pkg.set_version(4);
    pkg.set_header_length(5);
    pkg.set_total_length(total_length);
    pkg.set_ttl(ttl);
    pkg.set_next_level_protocol(protocol);
    pkg.set_source(src);
    pkg.set_destination(dst);
    let csum = ipv4::checksum(&pkg.to_immutable());
    pkg.set_checksum(csum);
}

/// A full UDP-in-IPv4 packet with valid checksums.
pub fn udp_packet(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    sport: u16,
    dport: u16,
    ttl: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut buffer = vec![0; IPV4_HEADER_SIZE + 8 + data.len()];
    {
        let mut udp_pkg = MutableUdpPacket::new(&mut buffer[IPV4_HEADER_SIZE..]).unwrap();
        udp_pkg.set_source(sport);
        udp_pkg.set_destination(dport);
        udp_pkg.set_length((8 + data.len()) as u16);
        udp_pkg.set_payload(data);
        let csum = udp::ipv4_checksum(&udp_pkg.to_immutable(), &src, &dst);
        udp_pkg.set_checksum(csum);
    }
    finish_ip_header(&mut buffer, src, dst, ttl, IpNextHeaderProtocols::Udp);
    buffer
}

/// A full Icmp-echo-in-IPv4 packet with valid checksums. `icmp_type` is
/// echo request or echo reply.
pub fn icmp_echo_packet(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    icmp_type: pnet::packet::icmp::IcmpType,
    id: u16,
    seq: u16,
    ttl: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut buffer = vec![0; IPV4_HEADER_SIZE + 8 + data.len()];
    {
        let mut echo = MutableEchoRequestPacket::new(&mut buffer[IPV4_HEADER_SIZE..]).unwrap();
        echo.set_icmp_type(icmp_type);
        echo.set_identifier(id);
        echo.set_sequence_number(seq);
        echo.set_payload(data);
    }
    let csum = icmp::checksum(&IcmpPacket::new(&buffer[IPV4_HEADER_SIZE..]).unwrap());
    MutableIcmpPacket::new(&mut buffer[IPV4_HEADER_SIZE..])
        .unwrap()
        .set_checksum(csum);
    finish_ip_header(&mut buffer, src, dst, ttl, IpNextHeaderProtocols::Icmp);
    buffer
}

pub fn icmp_echo_request(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    id: u16,
    seq: u16,
    ttl: u8,
    data: &[u8],
) -> Vec<u8> {
    icmp_echo_packet(src, dst, IcmpTypes::EchoRequest, id, seq, ttl, data)
}
