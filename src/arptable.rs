use std::net::Ipv4Addr;

use pnet::util::MacAddr;

use crate::InterfaceId;

/// Number of buckets in the neighbor table. Entries hash to
/// `ip % ARP_TABLE_SIZE` and collisions chain within the bucket.
pub const ARP_TABLE_SIZE: usize = 1111;

/// One resolved neighbor: which MAC answers for `ip`, and on which
/// interface it was learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub interface: InterfaceId,
}

/// The Arp neighbor table. Fixed bucket count, chained buckets, and at most
/// one entry per IP over the whole table: inserting an already known IP
/// updates that entry in place.
pub struct ArpTable {
    buckets: Vec<Vec<ArpEntry>>,
}

impl ArpTable {
    /// Creates a new `ArpTable` with no entries in it.
    pub fn new() -> ArpTable {
        ArpTable {
            buckets: vec![Vec::new(); ARP_TABLE_SIZE],
        }
    }

    fn bucket_of(ip: Ipv4Addr) -> usize {
        u32::from(ip) as usize % ARP_TABLE_SIZE
    }

    /// Inserts or updates the mapping for `ip`.
    pub fn insert(&mut self, interface: InterfaceId, ip: Ipv4Addr, mac: MacAddr) {
        let entry = ArpEntry {
            ip,
            mac,
            interface,
        };
        let chain = &mut self.buckets[Self::bucket_of(ip)];
        if let Some(existing) = chain.iter_mut().find(|e| e.ip == ip) {
            *existing = entry;
        } else {
            chain.push(entry);
        }
        debug!("Arp table entry: {} -> {}", ip, mac);
    }

    /// Hash-chain probe for `ip`.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&ArpEntry> {
        self.buckets[Self::bucket_of(ip)]
            .iter()
            .find(|e| e.ip == ip)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// All entries together with their bucket index, in bucket order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &ArpEntry)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .flat_map(|(i, chain)| chain.iter().map(move |e| (i, e)))
    }
}

impl Default for ArpTable {
    fn default() -> Self {
        Self::new()
    }
}
