//! Network address and port translation between one inside and one outside
//! interface. A flow is `(protocol, local address, local port)`; the first
//! outbound packet of a flow claims a slot in the per-protocol arena and
//! with it the outside port `NAT_PORT_MIN + slot` (for Icmp echo, the slot
//! index becomes the outside identifier). Incoming packets index the arena
//! directly by outside port. Translations are never reclaimed.
//!
//! Transport checksums are patched incrementally (RFC 1624) for the changed
//! address and port words; the IPv4 header checksum is recomputed from
//! scratch afterwards.

use std::fmt;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::{checksum, Ipv4Packet, MutableIpv4Packet};

use crate::ipv4::IPV4_HEADER_SIZE;
use crate::{InterfaceId, RxError, RxResult};

/// First outside port handed out; arena slot `i` owns port
/// `NAT_PORT_MIN + i`.
pub const NAT_PORT_MIN: u16 = 40000;

/// Translations kept per protocol.
pub const NAT_TABLE_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatProtocol {
    Tcp,
    Udp,
    Icmp,
}

impl fmt::Display for NatProtocol {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NatProtocol::Tcp => fmt.write_str("TCP"),
            NatProtocol::Udp => fmt.write_str("UDP"),
            NatProtocol::Icmp => fmt.write_str("ICMP"),
        }
    }
}

/// Which side of the boundary a packet is crossing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatDirection {
    /// Local network towards the outside.
    Outgoing,
    /// Outside towards the local network.
    Incoming,
}

/// One translation. For Icmp the port fields carry the echo identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatEntry {
    pub local_addr: Ipv4Addr,
    pub local_port: u16,
    pub outside_addr: Ipv4Addr,
    pub outside_port: u16,
}

impl NatEntry {
    fn unused() -> NatEntry {
        NatEntry {
            local_addr: Ipv4Addr::UNSPECIFIED,
            local_port: 0,
            outside_addr: Ipv4Addr::UNSPECIFIED,
            outside_port: 0,
        }
    }

    fn is_unused(&self) -> bool {
        self.outside_addr == Ipv4Addr::UNSPECIFIED
    }
}

/// Fixed-capacity translation arenas, one per supported protocol.
pub struct NatTable {
    tcp: Vec<NatEntry>,
    udp: Vec<NatEntry>,
    icmp: Vec<NatEntry>,
}

impl NatTable {
    pub fn new() -> NatTable {
        Self::with_capacity(NAT_TABLE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> NatTable {
        NatTable {
            tcp: vec![NatEntry::unused(); capacity],
            udp: vec![NatEntry::unused(); capacity],
            icmp: vec![NatEntry::unused(); capacity],
        }
    }

    fn arena(&self, proto: NatProtocol) -> &[NatEntry] {
        match proto {
            NatProtocol::Tcp => &self.tcp,
            NatProtocol::Udp => &self.udp,
            NatProtocol::Icmp => &self.icmp,
        }
    }

    fn arena_mut(&mut self, proto: NatProtocol) -> &mut [NatEntry] {
        match proto {
            NatProtocol::Tcp => &mut self.tcp,
            NatProtocol::Udp => &mut self.udp,
            NatProtocol::Icmp => &mut self.icmp,
        }
    }

    /// Finds the translation owning `(addr, port)` on the outside. Direct
    /// index: the port encodes the slot.
    pub fn lookup_outside(&self, proto: NatProtocol, addr: Ipv4Addr, port: u16) -> Option<NatEntry> {
        let index = match proto {
            NatProtocol::Icmp => port as usize,
            _ => (port as usize).checked_sub(NAT_PORT_MIN as usize)?,
        };
        let entry = self.arena(proto).get(index)?;
        if entry.is_unused() || entry.outside_addr != addr || entry.outside_port != port {
            return None;
        }
        Some(*entry)
    }

    /// Finds the translation of the flow `(addr, port)` on the local side.
    pub fn lookup_local(&self, proto: NatProtocol, addr: Ipv4Addr, port: u16) -> Option<NatEntry> {
        self.arena(proto)
            .iter()
            .find(|e| !e.is_unused() && e.local_addr == addr && e.local_port == port)
            .copied()
    }

    /// Claims the first free slot for a new flow. `None` when every slot of
    /// the protocol's arena is taken.
    pub fn allocate(
        &mut self,
        proto: NatProtocol,
        local_addr: Ipv4Addr,
        local_port: u16,
        outside_addr: Ipv4Addr,
    ) -> Option<NatEntry> {
        let base = match proto {
            NatProtocol::Icmp => 0,
            _ => NAT_PORT_MIN,
        };
        let (index, slot) = self
            .arena_mut(proto)
            .iter_mut()
            .enumerate()
            .find(|(_, e)| e.is_unused())?;
        *slot = NatEntry {
            local_addr,
            local_port,
            outside_addr,
            outside_port: base + index as u16,
        };
        Some(*slot)
    }

    /// Renders every active translation as an aligned text table.
    pub fn format_table(&self) -> String {
        let mut out = String::new();
        out.push_str("|-PROTO-|----------LOCAL--------|---------OUTSIDE-------|\n");
        for proto in [NatProtocol::Tcp, NatProtocol::Udp, NatProtocol::Icmp] {
            for entry in self.arena(proto).iter().filter(|e| !e.is_unused()) {
                let _ = writeln!(
                    out,
                    "| {:>5} | {:>15}:{:<5} | {:>15}:{:<5} |",
                    proto.to_string(),
                    entry.local_addr.to_string(),
                    entry.local_port,
                    entry.outside_addr.to_string(),
                    entry.outside_port,
                );
            }
        }
        out.push_str("|-------|-----------------------|-----------------------|\n");
        out
    }
}

impl Default for NatTable {
    fn default() -> Self {
        Self::new()
    }
}

/// NAPT state attached to the inside interface of the boundary: the address
/// flows are translated to, the interface it lives on, and the table.
pub struct NatEndpoint {
    pub outside_addr: Ipv4Addr,
    pub outside: InterfaceId,
    pub table: NatTable,
}

impl NatEndpoint {
    pub fn new(outside: InterfaceId, outside_addr: Ipv4Addr) -> NatEndpoint {
        NatEndpoint {
            outside_addr,
            outside,
            table: NatTable::new(),
        }
    }
}

/// Decides whether a packet crossing the boundary is subject to
/// translation. Icmp messages other than echo request/reply, unknown
/// transport protocols and truncated transport headers pass untranslated.
pub fn protocol_of(protocol: IpNextHeaderProtocol, packet: &[u8]) -> Option<NatProtocol> {
    let transport = packet.get(IPV4_HEADER_SIZE..)?;
    match protocol {
        IpNextHeaderProtocols::Tcp if transport.len() >= 18 => Some(NatProtocol::Tcp),
        IpNextHeaderProtocols::Udp if transport.len() >= 8 => Some(NatProtocol::Udp),
        IpNextHeaderProtocols::Icmp if transport.len() >= 8 => {
            let icmp_type = IcmpPacket::new(transport)?.get_icmp_type();
            if icmp_type == IcmpTypes::EchoRequest || icmp_type == IcmpTypes::EchoReply {
                Some(NatProtocol::Icmp)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Rewrites `packet` in place across the boundary. Outgoing packets get
/// their source rewritten to the outside address and port, allocating a
/// translation on first use; incoming packets get their destination
/// rewritten back to the local flow.
pub fn translate(
    packet: &mut [u8],
    proto: NatProtocol,
    direction: NatDirection,
    nat: &mut NatEndpoint,
) -> RxResult {
    let (source, destination) = {
        let pkg = Ipv4Packet::new(packet).ok_or(RxError::InvalidLength)?;
        (pkg.get_source(), pkg.get_destination())
    };
    let port = transport_port(packet, proto, direction);

    match direction {
        NatDirection::Incoming => {
            let entry = match nat.table.lookup_outside(proto, destination, port) {
                Some(entry) => entry,
                None => {
                    debug!("No NAPT entry for outside {}:{}", destination, port);
                    return Err(RxError::NatUnavailable);
                }
            };
            rewrite(packet, proto, direction, destination, port, entry.local_addr, entry.local_port);
        }
        NatDirection::Outgoing => {
            let entry = match nat.table.lookup_local(proto, source, port) {
                Some(entry) => entry,
                None => {
                    let entry = match nat.table.allocate(proto, source, port, nat.outside_addr) {
                        Some(entry) => entry,
                        None => {
                            warn!("NAPT table is full");
                            return Err(RxError::NatTableFull);
                        }
                    };
                    debug!(
                        "Created NAPT entry {}:{} -> {}:{}\n{}",
                        entry.local_addr,
                        entry.local_port,
                        entry.outside_addr,
                        entry.outside_port,
                        nat.table.format_table()
                    );
                    entry
                }
            };
            rewrite(packet, proto, direction, source, port, entry.outside_addr, entry.outside_port);
        }
    }

    // The length did not change, only addresses and ports: recompute the
    // header checksum from scratch.
    let mut pkg = MutableIpv4Packet::new(packet).unwrap();
    pkg.set_checksum(0);
    let csum = checksum(&pkg.to_immutable());
    pkg.set_checksum(csum);
    Ok(())
}

/// The flow-identifying transport field: source port going out, destination
/// port coming in, the echo identifier for Icmp either way.
fn transport_port(packet: &[u8], proto: NatProtocol, direction: NatDirection) -> u16 {
    let offset = IPV4_HEADER_SIZE + port_offset(proto, direction);
    u16::from_be_bytes([packet[offset], packet[offset + 1]])
}

fn port_offset(proto: NatProtocol, direction: NatDirection) -> usize {
    match (proto, direction) {
        (NatProtocol::Icmp, _) => 4,
        (_, NatDirection::Outgoing) => 0,
        (_, NatDirection::Incoming) => 2,
    }
}

/// Applies one translation to the buffer: fixes the transport checksum
/// incrementally, then writes the new address into the IP header and the
/// new port (or identifier) into the transport header.
fn rewrite(
    packet: &mut [u8],
    proto: NatProtocol,
    direction: NatDirection,
    old_addr: Ipv4Addr,
    old_port: u16,
    new_addr: Ipv4Addr,
    new_port: u16,
) {
    let csum_offset = IPV4_HEADER_SIZE
        + match proto {
            NatProtocol::Icmp => 2,
            NatProtocol::Udp => 6,
            NatProtocol::Tcp => 16,
        };
    let old_csum = u16::from_be_bytes([packet[csum_offset], packet[csum_offset + 1]]);

    // A zero UDP checksum means "not computed" and stays zero.
    if !(proto == NatProtocol::Udp && old_csum == 0) {
        let new_csum = match proto {
            // The Icmp checksum covers no pseudo header, only the
            // identifier changes.
            NatProtocol::Icmp => incremental_update(old_csum, &[old_port], &[new_port]),
            _ => {
                let old = split_words(old_addr);
                let new = split_words(new_addr);
                incremental_update(
                    old_csum,
                    &[old[0], old[1], old_port],
                    &[new[0], new[1], new_port],
                )
            }
        };
        packet[csum_offset..csum_offset + 2].copy_from_slice(&new_csum.to_be_bytes());
    }

    let addr_offset = match direction {
        NatDirection::Outgoing => 12,
        NatDirection::Incoming => 16,
    };
    packet[addr_offset..addr_offset + 4].copy_from_slice(&new_addr.octets());

    let offset = IPV4_HEADER_SIZE + port_offset(proto, direction);
    packet[offset..offset + 2].copy_from_slice(&new_port.to_be_bytes());
}

fn split_words(addr: Ipv4Addr) -> [u16; 2] {
    let octets = u32::from(addr);
    [(octets >> 16) as u16, octets as u16]
}

/// RFC 1624 incremental checksum update: `HC' = ~(~HC + ~m + m')`, folded
/// back into 16 bits.
fn incremental_update(checksum: u16, old: &[u16], new: &[u16]) -> u16 {
    let mut sum = u32::from(!checksum);
    for word in old {
        sum += u32::from(!word);
    }
    for word in new {
        sum += u32::from(*word);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
