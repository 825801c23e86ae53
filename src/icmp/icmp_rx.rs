use std::net::Ipv4Addr;

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::EchoRequestPacket;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::Packet;

use crate::router::Router;
use crate::{RxError, RxResult};

use super::send_echo_reply;

/// Handles one Icmp message addressed to the router. `local_addr` is the
/// address of the interface the message was delivered to; replies go out
/// with it as their source.
pub fn input(router: &mut Router, source: Ipv4Addr, local_addr: Ipv4Addr, payload: &[u8]) -> RxResult {
    if payload.len() < IcmpPacket::minimum_packet_size() {
        return Err(RxError::InvalidLength);
    }
    let icmp_type = IcmpPacket::new(payload)
        .ok_or(RxError::InvalidLength)?
        .get_icmp_type();

    match icmp_type {
        IcmpTypes::EchoReply => {
            let echo = EchoReplyPacket::new(payload).ok_or(RxError::InvalidLength)?;
            debug!(
                "Received icmp echo reply id {:04x} seq {}",
                echo.get_identifier(),
                echo.get_sequence_number()
            );
            Ok(())
        }
        IcmpTypes::EchoRequest => {
            let (identifier, sequence, data) = {
                let echo = EchoRequestPacket::new(payload).ok_or(RxError::InvalidLength)?;
                (
                    echo.get_identifier(),
                    echo.get_sequence_number(),
                    echo.payload().to_vec(),
                )
            };
            debug!("Received icmp echo request id {:04x} seq {}", identifier, sequence);
            if let Err(e) = send_echo_reply(router, source, local_addr, identifier, sequence, &data) {
                warn!("Unable to send icmp echo reply: {}", e);
            }
            Ok(())
        }
        other => Err(RxError::NoListener(format!(
            "Icmp: no listener for type {}",
            other.0
        ))),
    }
}
