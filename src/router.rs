use std::error::Error;
use std::fmt;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use pnet::util::MacAddr;

use crate::arptable::ArpTable;
use crate::nat::NatEndpoint;
use crate::routing::{Route, RoutingTable};
use crate::{
    ethernet, is_ignored_interface, EthernetChannel, Interface, InterfaceId, TxError, TxResult,
};

/// Error returned upon invalid configuration of the router.
#[derive(Debug)]
pub enum RouterError {
    /// The interface name is in the fixed ignore set.
    IgnoredInterface(String),

    /// No interface with that name is registered.
    UnknownInterface(String),

    /// The supplied addresses do not form a valid configuration.
    IllegalArgument(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use crate::router::RouterError::*;
        match *self {
            IgnoredInterface(ref name) => write!(fmt, "interface {} is ignored", name),
            UnknownInterface(ref name) => write!(fmt, "no interface named {}", name),
            IllegalArgument(ref msg) => write!(fmt, "illegal argument: {}", msg),
        }
    }
}

impl Error for RouterError {}

/// The router: the interface slab plus the three tables the pipeline works
/// against (Arp neighbors, the routing trie, and the NAPT table living on
/// the NAT inside interface). One thread owns the `Router` and does
/// everything on it; no operation blocks.
pub struct Router {
    interfaces: Vec<Interface>,
    arp: ArpTable,
    fib: RoutingTable,
    next_identification: u16,
}

impl Router {
    pub fn new() -> Router {
        Router {
            interfaces: Vec::new(),
            arp: ArpTable::new(),
            fib: RoutingTable::new(),
            next_identification: rand::random(),
        }
    }

    /// Registers an interface and hands back its id. Names in the ignore
    /// set are rejected.
    pub fn add_interface(
        &mut self,
        name: &str,
        mac: MacAddr,
        channel: Box<dyn EthernetChannel>,
    ) -> Result<InterfaceId, RouterError> {
        if is_ignored_interface(name) {
            return Err(RouterError::IgnoredInterface(name.to_owned()));
        }
        let id = self.interfaces.len();
        info!("Created interface {} with address {}", name, mac);
        self.interfaces
            .push(Interface::new(name.to_owned(), mac, channel));
        Ok(id)
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn interface_id(&self, name: &str) -> Option<InterfaceId> {
        self.interfaces.iter().position(|iface| iface.name() == name)
    }

    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id]
    }

    /// Assigns an address and netmask to an interface and installs the
    /// connected route for its subnet.
    pub fn set_ip(&mut self, name: &str, addr: Ipv4Addr, mask: Ipv4Addr) -> Result<(), RouterError> {
        let id = self
            .interface_id(name)
            .ok_or_else(|| RouterError::UnknownInterface(name.to_owned()))?;
        if addr == Ipv4Addr::UNSPECIFIED {
            return Err(RouterError::IllegalArgument(
                "the unspecified address cannot be assigned".to_owned(),
            ));
        }
        let net = Ipv4Network::with_netmask(addr, mask)
            .map_err(|e| RouterError::IllegalArgument(e.to_string()))?;
        self.interfaces[id].ip = Some(net);
        self.fib.add_connected(net, id);
        info!(
            "Set ip address {} to {}, connected route {}/{}",
            addr,
            name,
            net.network(),
            net.prefix()
        );
        Ok(())
    }

    /// Installs a route through the gateway `next_hop`. The gateway must be
    /// covered by a connected route for the route to be usable.
    pub fn add_route(&mut self, net: Ipv4Network, next_hop: Ipv4Addr) {
        info!("Set route {}/{} via {}", net.network(), net.prefix(), next_hop);
        self.fib.add_network(net, next_hop);
    }

    /// Puts the NAPT boundary between `inside` and `outside`. The outside
    /// interface's address becomes the translation address, so it must be
    /// configured first.
    pub fn enable_nat(&mut self, inside: &str, outside: &str) -> Result<(), RouterError> {
        let inside_id = self
            .interface_id(inside)
            .ok_or_else(|| RouterError::UnknownInterface(inside.to_owned()))?;
        let outside_id = self
            .interface_id(outside)
            .ok_or_else(|| RouterError::UnknownInterface(outside.to_owned()))?;
        let outside_addr = self.interfaces[outside_id]
            .ipv4()
            .map(|net| net.ip())
            .ok_or_else(|| {
                RouterError::IllegalArgument(format!("{} has no IPv4 address", outside))
            })?;
        info!(
            "Enabled NAPT from {} to {} ({})",
            inside, outside, outside_addr
        );
        self.interfaces[inside_id].nat = Some(NatEndpoint::new(outside_id, outside_addr));
        Ok(())
    }

    /// Polls every interface for at most one frame each and runs what
    /// arrived through the pipeline. Returns the number of handled frames.
    pub fn poll_all(&mut self) -> usize {
        let mut handled = 0;
        for id in 0..self.interfaces.len() {
            if let Some(frame) = self.interfaces[id].channel.poll() {
                self.process(id, &frame);
                handled += 1;
            }
        }
        handled
    }

    /// Runs one received frame through the pipeline. Drops are logged here
    /// and never propagate further.
    pub fn process(&mut self, interface: InterfaceId, frame: &[u8]) {
        if let Err(e) = ethernet::input(self, interface, frame) {
            debug!("Dropped frame on {}: {}", self.interfaces[interface].name(), e);
        }
    }

    pub(crate) fn transmit(&mut self, interface: InterfaceId, frame: &[u8]) -> TxResult {
        if let Err(e) = self.interfaces[interface].channel.transmit(frame) {
            error!("Transmit on {} failed: {}", self.interfaces[interface].name(), e);
            return Err(TxError::IoError(e));
        }
        Ok(())
    }

    pub fn arp_table(&self) -> &ArpTable {
        &self.arp
    }

    pub fn arp_table_mut(&mut self) -> &mut ArpTable {
        &mut self.arp
    }

    pub fn fib(&self) -> &RoutingTable {
        &self.fib
    }

    /// The interface owning `addr` as its address or broadcast, if any.
    pub(crate) fn local_destination(&self, addr: Ipv4Addr) -> Option<InterfaceId> {
        self.interfaces.iter().position(|iface| {
            iface
                .ipv4()
                .map_or(false, |net| net.ip() == addr || net.broadcast() == addr)
        })
    }

    /// The interface a route ultimately leaves through: directly for a
    /// connected route, through the gateway's connected route otherwise.
    pub(crate) fn egress_interface(&self, route: Route) -> Option<InterfaceId> {
        match route {
            Route::Connected(id) => Some(id),
            Route::Network(next_hop) => match self.fib.route(next_hop) {
                Some(Route::Connected(id)) => Some(id),
                _ => None,
            },
        }
    }

    /// The inside interface of the NAPT boundary, if one is configured.
    pub(crate) fn nat_inside(&self) -> Option<InterfaceId> {
        self.interfaces.iter().position(|iface| iface.nat.is_some())
    }

    pub(crate) fn nat_endpoint(&self, inside: InterfaceId) -> &NatEndpoint {
        self.interfaces[inside]
            .nat
            .as_ref()
            .expect("interface carries no NAPT endpoint")
    }

    pub(crate) fn nat_endpoint_mut(&mut self, inside: InterfaceId) -> &mut NatEndpoint {
        self.interfaces[inside]
            .nat
            .as_mut()
            .expect("interface carries no NAPT endpoint")
    }

    /// Identification field for the next packet the router originates.
    pub(crate) fn next_identification(&mut self) -> u16 {
        let id = self.next_identification;
        self.next_identification = id.wrapping_add(1);
        id
    }

    /// Renders the Arp table the way the `a` keystroke prints it.
    pub fn format_arp_table(&self) -> String {
        let mut out = String::new();
        out.push_str("|---IP ADDRESS----|----MAC ADDRESS----|-----INTERFACE-----|-BUCKET-|\n");
        for (bucket, entry) in self.arp.entries() {
            let name = self
                .interfaces
                .get(entry.interface)
                .map(Interface::name)
                .unwrap_or("?");
            let _ = writeln!(
                out,
                "| {:>15} | {:>17} | {:<17} |  {:>4}  |",
                entry.ip.to_string(),
                entry.mac.to_string(),
                name,
                bucket
            );
        }
        out.push_str("|-----------------|-------------------|-------------------|--------|\n");
        out
    }

    /// Renders the NAPT table, or a note when NAPT is off.
    pub fn format_nat_table(&self) -> String {
        match self.nat_inside() {
            Some(inside) => self.nat_endpoint(inside).table.format_table(),
            None => "NAPT is not enabled\n".to_owned(),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pnet::util::MacAddr;

    use crate::routing::Route;
    use crate::testing;

    use super::{Router, RouterError};

    fn router_with(names: &[&str]) -> Router {
        let mut router = Router::new();
        for (i, name) in names.iter().enumerate() {
            let (channel, _, _) = testing::channel();
            router
                .add_interface(name, MacAddr::new(2, 0, 0, 0, 0, i as u8), Box::new(channel))
                .unwrap();
        }
        router
    }

    #[test]
    fn rejects_ignored_names() {
        let mut router = Router::new();
        let (channel, _, _) = testing::channel();
        match router.add_interface("lo", MacAddr::zero(), Box::new(channel)) {
            Err(RouterError::IgnoredInterface(name)) => assert_eq!(name, "lo"),
            other => panic!("expected ignored interface error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(router.interface_count(), 0);
    }

    #[test]
    fn set_ip_installs_connected_route() {
        let mut router = router_with(&["eth0"]);
        router
            .set_ip("eth0", Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();

        assert_eq!(
            router.fib().route(Ipv4Addr::new(192, 168, 1, 200)),
            Some(Route::Connected(0))
        );
        assert!(router.fib().route(Ipv4Addr::new(192, 168, 2, 1)).is_none());
        let net = router.interface(0).ipv4().unwrap();
        assert_eq!(net.broadcast(), Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn set_ip_unknown_interface() {
        let mut router = router_with(&["eth0"]);
        assert!(matches!(
            router.set_ip("eth9", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 0, 0, 0)),
            Err(RouterError::UnknownInterface(_))
        ));
    }

    #[test]
    fn enable_nat_needs_outside_address() {
        let mut router = router_with(&["eth0", "eth1"]);
        assert!(matches!(
            router.enable_nat("eth0", "eth1"),
            Err(RouterError::IllegalArgument(_))
        ));

        router
            .set_ip("eth1", Ipv4Addr::new(203, 0, 113, 1), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
        router.enable_nat("eth0", "eth1").unwrap();
        assert_eq!(router.nat_inside(), Some(0));
        assert_eq!(router.nat_endpoint(0).outside_addr, Ipv4Addr::new(203, 0, 113, 1));
    }

    #[test]
    fn local_destination_matches_address_and_broadcast() {
        let mut router = router_with(&["eth0", "eth1"]);
        router
            .set_ip("eth0", Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
        router
            .set_ip("eth1", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 0, 0, 0))
            .unwrap();

        assert_eq!(router.local_destination(Ipv4Addr::new(192, 168, 1, 1)), Some(0));
        assert_eq!(router.local_destination(Ipv4Addr::new(192, 168, 1, 255)), Some(0));
        assert_eq!(router.local_destination(Ipv4Addr::new(10, 0, 0, 1)), Some(1));
        assert_eq!(router.local_destination(Ipv4Addr::new(192, 168, 2, 1)), None);
    }
}
