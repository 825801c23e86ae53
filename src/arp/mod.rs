//! The address resolution protocol. Incoming requests for configured
//! addresses are answered, incoming requests and replies populate the
//! neighbor table in [`crate::arptable`]. Resolution is on demand: when an
//! outbound packet misses the table, the packet is dropped and a request is
//! broadcast in its place. Nothing is queued behind a pending resolution;
//! the sender is expected to retransmit once the neighbor answered.

mod arp_rx;
mod arp_tx;

pub use self::arp_rx::input;
pub use self::arp_tx::{send_reply, send_request, ArpBuilder};

/// Ethernet payload length of an outgoing Arp frame: the 28 byte message
/// padded up to the ethernet minimum.
pub const ARP_FRAME_PAYLOAD_LEN: usize = 46;
