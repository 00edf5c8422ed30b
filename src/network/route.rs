//! Forwarding table with longest-prefix-match lookup, relevant rfc1519, rfc4632.

use std::net::Ipv4Addr;

use crate::wire::Ipv4Cidr;

/// A prefix of addresses that should be forwarded via a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// The network routed through this entry.
    pub net: Ipv4Cidr,
    /// Directly attached next hop for this network.
    pub next_hop: Ipv4Addr,
}

impl Route {
    /// Create a route for `net` via `next_hop`.
    pub fn new(net: Ipv4Cidr, next_hop: Ipv4Addr) -> Self {
        Self { net, next_hop }
    }

    /// Returns a route matching `0.0.0.0/0` via the `gateway`.
    ///
    /// This route is the worst match for all addresses.
    pub fn default_gateway(gateway: Ipv4Addr) -> Self {
        Self::new(Ipv4Cidr::any(), gateway)
    }
}

/// An ordered forwarding table.
///
/// The table is replaced as a whole and never mutated by lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingTable {
    routes: Vec<Route>,
}

impl ForwardingTable {
    /// Create a table from routes in configuration order.
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Routes in configuration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Next hop for `dst`, or `None` if no entry matches.
    ///
    /// Among matching entries the longest prefix wins. On equal lengths the
    /// entry configured first wins.
    pub fn lookup(&self, dst: Ipv4Addr) -> Option<Ipv4Addr> {
        let mut best_match: Option<&Route> = None;
        for route in &self.routes {
            if !route.net.contains(dst) {
                continue;
            }

            let best = best_match.get_or_insert(route);
            if best.net.prefix_len() < route.net.prefix_len() {
                *best = route;
            }
        }
        best_match.map(|route| route.next_hop)
    }
}

impl FromIterator<Route> for ForwardingTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
