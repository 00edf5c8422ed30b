//! Node-level configuration.

use std::net::Ipv4Addr;

use crate::network::Route;
use crate::wire::Ipv4Cidr;

/// Configuration for the link and network layers of a [`Stack`](super::Stack).
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Address this node answers to.
    pub local_addr: Ipv4Addr,

    /// Forwarding table in configuration order.
    pub routes: Vec<Route>,

    /// Skip IPv4 header checksum validation.
    pub ignore_checksum: bool,

    /// Seed for IP identification values; random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            local_addr: Ipv4Addr::UNSPECIFIED,
            routes: Vec::new(),
            ignore_checksum: false,
            rng_seed: None,
        }
    }
}

/// Builder for a [`StackConfig`].
///
/// ```
/// use std::net::Ipv4Addr;
/// use slipstack::stack::StackBuilder;
///
/// let config = StackBuilder::new()
///     .local_addr(Ipv4Addr::new(10, 0, 0, 1))
///     .route("10.0.0.0/8".parse().unwrap(), Ipv4Addr::new(10, 0, 0, 254))
///     .build();
/// assert_eq!(config.routes.len(), 1);
/// ```
#[derive(Debug)]
pub struct StackBuilder {
    config: StackConfig,
}

impl StackBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: StackConfig::default(),
        }
    }

    /// Set the local address.
    pub fn local_addr(mut self, addr: Ipv4Addr) -> Self {
        self.config.local_addr = addr;
        self
    }

    /// Append a forwarding table entry.
    pub fn route(mut self, net: Ipv4Cidr, next_hop: Ipv4Addr) -> Self {
        self.config.routes.push(Route::new(net, next_hop));
        self
    }

    /// Append several forwarding table entries.
    pub fn routes<I>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = Route>,
    {
        self.config.routes.extend(routes);
        self
    }

    /// Enable or disable header checksum validation on receive.
    pub fn ignore_checksum(mut self, ignore: bool) -> Self {
        self.config.ignore_checksum = ignore;
        self
    }

    /// Make IP identification values reproducible.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> StackConfig {
        self.config
    }
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}
