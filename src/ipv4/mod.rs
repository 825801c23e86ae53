//! IPv4 ingress, forwarding and egress. Ingress classifies every packet as
//! addressed to the router (local delivery) or somebody else (forwarding
//! against the routing table). Egress encapsulates upper-protocol payloads
//! and resolves the destination, or its gateway, through Arp.

mod ipv4_rx;
mod ipv4_tx;

pub use self::ipv4_rx::input;
pub use self::ipv4_tx::{output, output_to_host, output_to_next_hop, send};

/// Bytes in an IPv4 header without options. Options are not supported and
/// packets carrying them are dropped.
pub const IPV4_HEADER_SIZE: usize = 20;

/// TTL of packets originated by the router itself.
pub const DEFAULT_TTL: u8 = 0xff;
