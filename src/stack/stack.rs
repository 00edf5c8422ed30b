//! The three layers wired together.

use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::debug;

use super::config::StackConfig;
use super::error::StackError;
use crate::link::{LinkLayer, PhysicalLink};
use crate::network::{ForwardingTable, Node, NodeSender, Route};
use crate::transport::{AcceptObserver, ConnectionId, DataObserver, Server, TransportConfig};

/// One node: a link multiplexer, an IPv4 node and an optional transport server.
///
/// Every entry point takes `&mut self` and the current time, so events are
/// processed one at a time and run to completion.
#[derive(Debug)]
pub struct Stack<P> {
    link: LinkLayer<P>,
    node: Node,
    server: Option<Server>,
}

impl<P: PhysicalLink> Stack<P> {
    /// Create a stack over `(peer address, physical link)` pairs.
    pub fn new<I>(config: StackConfig, links: I) -> Self
    where
        I: IntoIterator<Item = (Ipv4Addr, P)>,
    {
        let mut node = Node::new(config.local_addr).with_ignore_checksum(config.ignore_checksum);
        if let Some(seed) = config.rng_seed {
            node = node.with_seed(seed);
        }
        node.set_table(ForwardingTable::new(config.routes));

        Self {
            link: LinkLayer::new(links),
            node,
            server: None,
        }
    }

    /// Bind the transport server and register its observers.
    pub fn listen<A, D>(
        &mut self,
        config: TransportConfig,
        accept: A,
        data: D,
    ) -> Result<(), StackError>
    where
        A: AcceptObserver + 'static,
        D: DataObserver + 'static,
    {
        if let Some(server) = &self.server {
            return Err(StackError::Config(format!(
                "already listening on port {}",
                server.port()
            )));
        }
        debug!(port = config.port, "listening");
        self.server = Some(Server::new(config, accept, data));
        Ok(())
    }

    /// Replace the forwarding table.
    pub fn set_routes(&mut self, routes: Vec<Route>) {
        self.node.set_table(ForwardingTable::new(routes));
    }

    /// Feed bytes read from the link to `peer`.
    ///
    /// Every completed datagram is processed even if an earlier one fails;
    /// the first failure is returned.
    pub fn on_bytes(&mut self, peer: Ipv4Addr, bytes: &[u8], now: Instant) -> Result<(), StackError> {
        let datagrams = self.link.receive(peer, bytes)?;

        let mut first_error = None;
        for datagram in datagrams {
            if let Err(e) = self.on_datagram(&datagram, now) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn on_datagram(&mut self, datagram: &[u8], now: Instant) -> Result<(), StackError> {
        let Some(delivery) = self.node.receive(&mut self.link, datagram)? else {
            return Ok(());
        };
        let Some(server) = self.server.as_mut() else {
            debug!(src = %delivery.src, "segment arrived with no listener");
            return Ok(());
        };

        let mut net = NodeSender::new(&mut self.node, &mut self.link);
        server.on_segment(&mut net, now, delivery.src, delivery.dst, &delivery.payload)?;
        Ok(())
    }

    /// Queue `data` on connection `id`.
    pub fn send(&mut self, id: ConnectionId, data: &[u8], now: Instant) -> Result<(), StackError> {
        let (server, mut net) = self.parts()?;
        server.send(&mut net, id, data, now)?;
        Ok(())
    }

    /// Close connection `id`.
    pub fn close(&mut self, id: ConnectionId) -> Result<(), StackError> {
        let (server, mut net) = self.parts()?;
        server.close(&mut net, id)?;
        Ok(())
    }

    /// Fire expired retransmission timers.
    pub fn poll(&mut self, now: Instant) -> Result<(), StackError> {
        let Some(server) = self.server.as_mut() else {
            return Ok(());
        };
        let mut net = NodeSender::new(&mut self.node, &mut self.link);
        server.poll_timers(&mut net, now)?;
        Ok(())
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.server.as_ref().and_then(Server::next_deadline)
    }

    /// The transport server, once listening.
    pub fn server(&self) -> Option<&Server> {
        self.server.as_ref()
    }

    /// Mutable access to the transport server, e.g. to reap closed connections.
    pub fn server_mut(&mut self) -> Option<&mut Server> {
        self.server.as_mut()
    }

    /// The network node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The link multiplexer.
    pub fn link(&self) -> &LinkLayer<P> {
        &self.link
    }

    /// Mutable access to the link multiplexer.
    pub fn link_mut(&mut self) -> &mut LinkLayer<P> {
        &mut self.link
    }

    fn parts(&mut self) -> Result<(&mut Server, NodeSender<'_, LinkLayer<P>>), StackError> {
        let server = self
            .server
            .as_mut()
            .ok_or_else(|| StackError::Config("no server is listening".into()))?;
        Ok((server, NodeSender::new(&mut self.node, &mut self.link)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::constants::{IPPROTO_ICMP, IPPROTO_TCP};
    use crate::core::{LinkError, NetworkError};
    use crate::link::SlipCodec;
    use crate::stack::StackBuilder;
    use crate::wire::{IcmpHeader, Ipv4Header, TcpFlags, TcpHeader};

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const PEER_A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const PEER_B: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 2);
    const HOST_B: Ipv4Addr = Ipv4Addr::new(192, 168, 7, 7);

    fn stack() -> Stack<Vec<u8>> {
        let config = StackBuilder::new()
            .local_addr(LOCAL)
            .route("10.0.0.0/24".parse().unwrap(), PEER_A)
            .route("192.168.0.0/16".parse().unwrap(), PEER_B)
            .route("172.16.0.0/12".parse().unwrap(), Ipv4Addr::new(172, 16, 0, 1))
            .rng_seed(3)
            .build();
        Stack::new(config, [(PEER_A, Vec::new()), (PEER_B, Vec::new())])
    }

    fn frame(src: Ipv4Addr, dst: Ipv4Addr, ttl: u8, protocol: u8, payload: &[u8]) -> Vec<u8> {
        let mut header = Ipv4Header::new(src, dst, protocol, 99, payload.len());
        header.ttl = ttl;
        SlipCodec::encode(&header.emit(payload))
    }

    fn drain(stack: &mut Stack<Vec<u8>>, peer: Ipv4Addr) -> Vec<Vec<u8>> {
        let bytes = std::mem::take(stack.link_mut().physical_mut(peer).unwrap());
        SlipCodec::new().decode(&bytes)
    }

    #[test]
    fn test_router_forwards_between_links() {
        let mut stack = stack();
        let bytes = frame(PEER_A, HOST_B, 10, IPPROTO_TCP, b"transit");

        stack.on_bytes(PEER_A, &bytes, Instant::now()).unwrap();

        assert!(drain(&mut stack, PEER_A).is_empty());
        let out = drain(&mut stack, PEER_B);
        assert_eq!(out.len(), 1);
        let (header, payload) = Ipv4Header::from_bytes(&out[0]).unwrap();
        assert_eq!(header.ttl, 9);
        assert_eq!(header.dst, HOST_B);
        assert_eq!(payload, b"transit");
    }

    #[test]
    fn test_expired_ttl_answered_on_ingress_link() {
        let mut stack = stack();
        let bytes = frame(PEER_A, HOST_B, 1, IPPROTO_TCP, b"transit");

        stack.on_bytes(PEER_A, &bytes, Instant::now()).unwrap();

        assert!(drain(&mut stack, PEER_B).is_empty());
        let out = drain(&mut stack, PEER_A);
        assert_eq!(out.len(), 1);
        let (header, body) = Ipv4Header::from_bytes(&out[0]).unwrap();
        assert_eq!(header.protocol, IPPROTO_ICMP);
        assert_eq!(header.dst, PEER_A);
        assert_eq!(IcmpHeader::from_bytes(body).unwrap().0.kind, 11);
    }

    #[test]
    fn test_missing_link_surfaces() {
        let mut stack = stack();
        let bytes = frame(PEER_A, Ipv4Addr::new(172, 16, 3, 3), 10, IPPROTO_TCP, b"x");

        let err = stack.on_bytes(PEER_A, &bytes, Instant::now()).unwrap_err();
        assert!(matches!(
            err,
            StackError::Network(NetworkError::Link(LinkError::UnknownNextHop(_)))
        ));
    }

    #[test]
    fn test_missing_route_surfaces_after_all_datagrams() {
        let mut stack = stack();
        let mut bytes = frame(PEER_A, Ipv4Addr::new(8, 8, 8, 8), 10, IPPROTO_TCP, b"x");
        bytes.extend(frame(PEER_A, HOST_B, 10, IPPROTO_TCP, b"y"));

        let err = stack.on_bytes(PEER_A, &bytes, Instant::now()).unwrap_err();
        assert!(matches!(err, StackError::Network(NetworkError::NoRoute(_))));
        assert_eq!(drain(&mut stack, PEER_B).len(), 1);
    }

    #[test]
    fn test_unknown_peer() {
        let mut stack = stack();
        let err = stack
            .on_bytes(Ipv4Addr::new(1, 1, 1, 1), &[0xc0], Instant::now())
            .unwrap_err();
        assert!(matches!(err, StackError::Link(LinkError::UnknownPeer(_))));
    }

    #[test]
    fn test_local_segment_without_listener_dropped() {
        let mut stack = stack();
        let syn = TcpHeader::new(40000, 80, 1000, 0, TcpFlags::SYN).emit(&[], PEER_A, LOCAL);
        stack
            .on_bytes(PEER_A, &frame(PEER_A, LOCAL, 64, IPPROTO_TCP, &syn), Instant::now())
            .unwrap();
        assert!(drain(&mut stack, PEER_A).is_empty());
    }

    #[test]
    fn test_listen_answers_syn() {
        let mut stack = stack();
        let accepted = Arc::new(Mutex::new(Vec::new()));
        stack
            .listen(
                TransportConfig::default(),
                {
                    let accepted = accepted.clone();
                    move |id: ConnectionId| accepted.lock().unwrap().push(id)
                },
                |_: ConnectionId, _: &[u8]| {},
            )
            .unwrap();

        let syn = TcpHeader::new(40000, 80, 1000, 0, TcpFlags::SYN).emit(&[], PEER_A, LOCAL);
        stack
            .on_bytes(PEER_A, &frame(PEER_A, LOCAL, 64, IPPROTO_TCP, &syn), Instant::now())
            .unwrap();

        assert_eq!(accepted.lock().unwrap().len(), 1);
        let out = drain(&mut stack, PEER_A);
        let (ip, segment) = Ipv4Header::from_bytes(&out[0]).unwrap();
        assert_eq!(ip.src, LOCAL);
        assert_eq!(ip.dst, PEER_A);
        let (tcp, _) = TcpHeader::from_bytes(segment).unwrap();
        assert_eq!(tcp.flags, TcpFlags::SYN | TcpFlags::ACK);
        assert_eq!(tcp.ack, 1001);
    }

    #[test]
    fn test_operations_require_listener() {
        let mut stack = stack();
        let id = ConnectionId {
            remote_addr: PEER_A,
            remote_port: 1,
            local_addr: LOCAL,
            local_port: 80,
        };
        assert!(matches!(
            stack.send(id, b"x", Instant::now()),
            Err(StackError::Config(_))
        ));
        assert!(matches!(stack.close(id), Err(StackError::Config(_))));
        assert!(stack.poll(Instant::now()).is_ok());
        assert!(stack.next_deadline().is_none());
    }

    #[test]
    fn test_listen_twice_fails() {
        let mut stack = stack();
        stack
            .listen(TransportConfig::default(), |_: ConnectionId| {}, |_: ConnectionId, _: &[u8]| {})
            .unwrap();
        let err = stack
            .listen(TransportConfig::default(), |_: ConnectionId| {}, |_: ConnectionId, _: &[u8]| {})
            .unwrap_err();
        assert!(matches!(err, StackError::Config(_)));
    }

    #[test]
    fn test_set_routes_replaces_table() {
        let mut stack = stack();
        stack.set_routes(vec![Route::default_gateway(PEER_B)]);
        assert_eq!(stack.node().table().len(), 1);
        assert_eq!(stack.node().next_hop(PEER_A).unwrap(), PEER_B);
    }
}
