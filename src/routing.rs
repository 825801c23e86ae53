use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::trie::BinaryTrie;
use crate::InterfaceId;

/// How a matched destination is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The destination is on the link of this interface and resolves
    /// directly through Arp.
    Connected(InterfaceId),

    /// The destination is behind a gateway. The gateway itself must be
    /// covered by a `Connected` route.
    Network(Ipv4Addr),
}

/// The forwarding information base: a binary trie of IPv4 prefixes queried
/// with longest prefix match for every forwarded packet.
pub struct RoutingTable {
    trie: BinaryTrie<Route>,
}

impl RoutingTable {
    pub fn new() -> RoutingTable {
        RoutingTable {
            trie: BinaryTrie::new(),
        }
    }

    /// Registers `net` as directly reachable via `interface`.
    pub fn add_connected(&mut self, net: Ipv4Network, interface: InterfaceId) {
        self.add(net, Route::Connected(interface));
    }

    /// Registers `net` as reachable through the gateway `next_hop`.
    pub fn add_network(&mut self, net: Ipv4Network, next_hop: Ipv4Addr) {
        self.add(net, Route::Network(next_hop));
    }

    fn add(&mut self, net: Ipv4Network, route: Route) {
        let prefix = u32::from(net.network());
        if let Some(old) = self.trie.insert(prefix, net.prefix(), route) {
            debug!("Replacing route for {}/{}: {:?}", net.network(), net.prefix(), old);
        }
    }

    /// Longest prefix match for `ip`.
    pub fn route(&self, ip: Ipv4Addr) -> Option<Route> {
        self.trie.longest_match(u32::from(ip)).copied()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}
