//! Internet control message protocol handling: answering echo requests and
//! building the error messages the forwarding path emits.

mod icmp_rx;
mod icmp_tx;

pub use self::icmp_rx::input;
pub use self::icmp_tx::{send_destination_unreachable, send_echo_reply, send_time_exceeded};

use pnet::packet::icmp::IcmpCode;

use crate::ipv4::IPV4_HEADER_SIZE;

/// Time exceeded code 0: time to live exceeded in transit.
pub const TIME_EXCEEDED_TTL: IcmpCode = IcmpCode(0);

/// Destination unreachable code 3: port unreachable.
pub const PORT_UNREACHABLE: IcmpCode = IcmpCode(3);

/// Icmp error messages quote the offending IP header plus the first eight
/// payload bytes.
pub const ERROR_DATA_LEN: usize = IPV4_HEADER_SIZE + 8;
