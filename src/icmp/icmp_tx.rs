use std::net::Ipv4Addr;

use pnet::packet::icmp::destination_unreachable::MutableDestinationUnreachablePacket;
use pnet::packet::icmp::echo_reply::MutableEchoReplyPacket;
use pnet::packet::icmp::time_exceeded::MutableTimeExceededPacket;
use pnet::packet::icmp::{checksum, IcmpCode, IcmpPacket, MutableIcmpPacket, IcmpTypes};

use pnet::packet::ip::IpNextHeaderProtocols;

use crate::ipv4;
use crate::router::Router;
use crate::util::BufferChain;
use crate::TxResult;

use super::{ERROR_DATA_LEN, PORT_UNREACHABLE, TIME_EXCEEDED_TTL};

/// Sends an echo reply mirroring identifier, sequence number and data of a
/// received echo request.
pub fn send_echo_reply(
    router: &mut Router,
    destination: Ipv4Addr,
    source: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    data: &[u8],
) -> TxResult {
    let mut buffer = vec![0; MutableEchoReplyPacket::minimum_packet_size() + data.len()];
    {
        let mut pkg = MutableEchoReplyPacket::new(&mut buffer[..]).unwrap();
        pkg.set_icmp_type(IcmpTypes::EchoReply);
        pkg.set_icmp_code(IcmpCode(0));
        pkg.set_identifier(identifier);
        pkg.set_sequence_number(sequence);
        pkg.set_payload(data);
    }
    finish(router, destination, source, buffer)
}

/// Sends a time exceeded error (code 0, TTL ran out) back to the source of
/// the packet in `original`.
pub fn send_time_exceeded(
    router: &mut Router,
    destination: Ipv4Addr,
    source: Ipv4Addr,
    original: &[u8],
) -> TxResult {
    if original.len() < ERROR_DATA_LEN {
        debug!("Offending packet too short to quote in an icmp error");
        return Ok(());
    }
    let mut buffer = vec![0; MutableTimeExceededPacket::minimum_packet_size() + ERROR_DATA_LEN];
    {
        let mut pkg = MutableTimeExceededPacket::new(&mut buffer[..]).unwrap();
        pkg.set_icmp_type(IcmpTypes::TimeExceeded);
        pkg.set_icmp_code(TIME_EXCEEDED_TTL);
        pkg.set_unused(0);
        pkg.set_payload(&original[..ERROR_DATA_LEN]);
    }
    finish(router, destination, source, buffer)
}

/// Sends a destination unreachable error (code 3, port unreachable) back to
/// the source of the packet in `original`.
pub fn send_destination_unreachable(
    router: &mut Router,
    destination: Ipv4Addr,
    source: Ipv4Addr,
    original: &[u8],
) -> TxResult {
    if original.len() < ERROR_DATA_LEN {
        debug!("Offending packet too short to quote in an icmp error");
        return Ok(());
    }
    let mut buffer =
        vec![0; MutableDestinationUnreachablePacket::minimum_packet_size() + ERROR_DATA_LEN];
    {
        let mut pkg = MutableDestinationUnreachablePacket::new(&mut buffer[..]).unwrap();
        pkg.set_icmp_type(IcmpTypes::DestinationUnreachable);
        pkg.set_icmp_code(PORT_UNREACHABLE);
        pkg.set_unused(0);
        pkg.set_payload(&original[..ERROR_DATA_LEN]);
    }
    finish(router, destination, source, buffer)
}

/// Checksums the finished message over its full length and hands it to the
/// IP layer.
fn finish(router: &mut Router, destination: Ipv4Addr, source: Ipv4Addr, mut buffer: Vec<u8>) -> TxResult {
    let csum = checksum(&IcmpPacket::new(&buffer).unwrap());
    MutableIcmpPacket::new(&mut buffer[..]).unwrap().set_checksum(csum);
    ipv4::send(
        router,
        destination,
        source,
        BufferChain::from_vec(buffer),
        IpNextHeaderProtocols::Icmp,
    )
}
