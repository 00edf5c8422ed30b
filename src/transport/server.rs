//! Passive-open transport server.
//!
//! Demultiplexes inbound segments by 4-tuple, answers SYNs, and exposes the
//! application operations (`send`, `close`) and timer polling.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, warn};

use super::connection::{Connection, ConnectionId};
use super::error::{TransportError, TransportResult};
use super::timing::RttEstimator;
use crate::core::NetworkError;
use crate::core::constants::{DEFAULT_MSS, INITIAL_RTO, MAX_MSS, MAX_RTO, MIN_RTO};
use crate::network::NetworkSend;
use crate::wire::{TcpFlags, TcpHeader, verify_tcp_checksum};

/// Notified once per passive open.
pub trait AcceptObserver: Send {
    /// A SYN created a new connection.
    fn connection_accepted(&mut self, id: ConnectionId);
}

impl<F> AcceptObserver for F
where
    F: FnMut(ConnectionId) + Send,
{
    fn connection_accepted(&mut self, id: ConnectionId) {
        self(id)
    }
}

/// Receives in-order payloads. An empty payload signals end of stream.
pub trait DataObserver: Send {
    /// Bytes arrived in order on `id`, or the connection closed if `data` is empty.
    fn data_received(&mut self, id: ConnectionId, data: &[u8]);
}

impl<F> DataObserver for F
where
    F: FnMut(ConnectionId, &[u8]) + Send,
{
    fn data_received(&mut self, id: ConnectionId, data: &[u8]) {
        self(id, data)
    }
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on.
    pub port: u16,

    /// Maximum segment payload.
    pub mss: usize,

    /// Skip pseudo-header checksum validation.
    pub ignore_checksum: bool,

    /// Retransmission timeout before the first RTT sample.
    pub initial_rto: Duration,

    /// Lower bound for the computed timeout.
    pub min_rto: Duration,

    /// Upper bound for the computed timeout.
    pub max_rto: Duration,

    /// Seed for initial sequence numbers; random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 80,
            mss: DEFAULT_MSS,
            ignore_checksum: false,
            initial_rto: INITIAL_RTO,
            min_rto: MIN_RTO,
            max_rto: MAX_RTO,
            rng_seed: None,
        }
    }
}

/// Builder for a [`TransportConfig`].
#[derive(Debug)]
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Set the listening port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the maximum segment size, clamped so a segment fits one datagram.
    pub fn mss(mut self, mss: usize) -> Self {
        self.config.mss = mss.clamp(1, MAX_MSS);
        self
    }

    /// Enable or disable checksum validation on receive.
    pub fn ignore_checksum(mut self, ignore: bool) -> Self {
        self.config.ignore_checksum = ignore;
        self
    }

    /// Set the timeout used before the first RTT sample.
    pub fn initial_rto(mut self, rto: Duration) -> Self {
        self.config.initial_rto = rto;
        self
    }

    /// Set the clamp range for computed timeouts.
    pub fn rto_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.config.min_rto = min;
        self.config.max_rto = max.max(min);
        self
    }

    /// Make initial sequence numbers reproducible.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Listening transport endpoint and its connections.
pub struct Server {
    config: TransportConfig,
    connections: HashMap<ConnectionId, Connection>,
    accept: Box<dyn AcceptObserver>,
    data: Box<dyn DataObserver>,
    rng: StdRng,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Bind a server and register its observers.
    pub fn new<A, D>(config: TransportConfig, accept: A, data: D) -> Self
    where
        A: AcceptObserver + 'static,
        D: DataObserver + 'static,
    {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            connections: HashMap::new(),
            accept: Box::new(accept),
            data: Box::new(data),
            rng,
        }
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Process a segment delivered by the network layer.
    ///
    /// Malformed, misaddressed and unmatched segments are logged and dropped.
    /// Only failures to route a reply are returned.
    pub fn on_segment<N>(
        &mut self,
        net: &mut N,
        now: Instant,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        segment: &[u8],
    ) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        match self.process(net, now, src, dst, segment) {
            Ok(()) => Ok(()),
            Err(TransportError::Network(e)) => Err(e),
            Err(e) if e.is_silent_drop() => {
                if e.is_suspicious() {
                    warn!(%src, error = %e, "dropping segment");
                } else {
                    debug!(%src, error = %e, "dropping segment");
                }
                Ok(())
            }
            Err(e) => {
                warn!(%src, error = %e, "unexpected transport error");
                Ok(())
            }
        }
    }

    fn process<N>(
        &mut self,
        net: &mut N,
        now: Instant,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        segment: &[u8],
    ) -> TransportResult<()>
    where
        N: NetworkSend + ?Sized,
    {
        let (header, payload) = TcpHeader::from_bytes(segment)?;
        if header.dst_port != self.config.port {
            return Err(TransportError::WrongPort(header.dst_port));
        }
        if !self.config.ignore_checksum && !verify_tcp_checksum(segment, src, dst) {
            return Err(TransportError::ChecksumMismatch);
        }

        let id = ConnectionId {
            remote_addr: src,
            remote_port: header.src_port,
            local_addr: dst,
            local_port: header.dst_port,
        };

        if header.flags.contains(TcpFlags::SYN) {
            match self.connections.get_mut(&id) {
                Some(conn) if conn.is_open() && conn.irs() == header.seq => {
                    debug!(%id, "duplicate syn, resending syn+ack");
                    conn.send_syn_ack(net)?;
                    return Ok(());
                }
                Some(conn) if conn.is_open() => {}
                _ => return self.accept(net, id, header.seq),
            }
        }

        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(TransportError::UnknownConnection(id))?;
        conn.on_segment(net, &header, payload, now, &mut *self.data)?;
        Ok(())
    }

    fn accept<N>(&mut self, net: &mut N, id: ConnectionId, irs: u32) -> TransportResult<()>
    where
        N: NetworkSend + ?Sized,
    {
        let iss = self.rng.next_u32();
        let rtt = RttEstimator::with_bounds(
            self.config.initial_rto,
            self.config.min_rto,
            self.config.max_rto,
        );
        let conn = self
            .connections
            .entry(id)
            .insert_entry(Connection::accept(id, irs, iss, self.config.mss, rtt))
            .into_mut();

        // The record is live from here on, so the application hears about it
        // even if the SYN+ACK cannot be sent; a retried SYN resends it.
        debug!(%id, iss, irs, "connection accepted");
        self.accept.connection_accepted(id);
        conn.send_syn_ack(net)?;
        Ok(())
    }

    /// Queue `data` on connection `id`.
    pub fn send<N>(
        &mut self,
        net: &mut N,
        id: ConnectionId,
        data: &[u8],
        now: Instant,
    ) -> TransportResult<()>
    where
        N: NetworkSend + ?Sized,
    {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(TransportError::UnknownConnection(id))?;
        conn.send(net, data, now)?;
        Ok(())
    }

    /// Close connection `id`.
    pub fn close<N>(&mut self, net: &mut N, id: ConnectionId) -> TransportResult<()>
    where
        N: NetworkSend + ?Sized,
    {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(TransportError::UnknownConnection(id))?;
        conn.close(net, &mut *self.data)?;
        Ok(())
    }

    /// Fire every retransmission timer whose deadline has passed.
    ///
    /// All due timers fire even if one fails; the first failure is returned.
    pub fn poll_timers<N>(&mut self, net: &mut N, now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        let mut first_error = None;
        for conn in self.connections.values_mut() {
            if let Err(e) = conn.poll(net, now) {
                warn!(id = %conn.id(), error = %e, "retransmission failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Earliest pending retransmission deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.connections
            .values()
            .filter_map(Connection::deadline)
            .min()
    }

    /// Look up a connection.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// All known connections, open or closed.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values()
    }

    /// Forget closed connections. Returns how many were removed.
    pub fn reap_closed(&mut self) -> usize {
        let before = self.connections.len();
        self.connections.retain(|_, conn| conn.is_open());
        before - self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::constants::IPPROTO_TCP;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const REMOTE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[derive(Default)]
    struct RecordingNet {
        sent: Vec<TcpHeader>,
        unreachable: bool,
    }

    impl NetworkSend for RecordingNet {
        fn send(&mut self, payload: &[u8], dst: Ipv4Addr, protocol: u8) -> Result<(), NetworkError> {
            if self.unreachable {
                return Err(NetworkError::NoRoute(dst));
            }
            assert_eq!(protocol, IPPROTO_TCP);
            let (header, _) = TcpHeader::from_bytes(payload).unwrap();
            self.sent.push(header);
            Ok(())
        }
    }

    type Log<T> = Arc<Mutex<Vec<T>>>;

    fn server(config: TransportConfig) -> (Server, Log<ConnectionId>, Log<Vec<u8>>) {
        let accepted: Log<ConnectionId> = Arc::default();
        let delivered: Log<Vec<u8>> = Arc::default();
        let server = Server::new(
            config,
            {
                let accepted = accepted.clone();
                move |id: ConnectionId| accepted.lock().unwrap().push(id)
            },
            {
                let delivered = delivered.clone();
                move |_id: ConnectionId, data: &[u8]| delivered.lock().unwrap().push(data.to_vec())
            },
        );
        (server, accepted, delivered)
    }

    fn config() -> TransportConfig {
        TransportBuilder::new().port(80).rng_seed(42).build()
    }

    fn segment(seq: u32, ack: u32, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
        TcpHeader::new(40000, 80, seq, ack, flags).emit(payload, REMOTE, LOCAL)
    }

    fn id() -> ConnectionId {
        ConnectionId {
            remote_addr: REMOTE,
            remote_port: 40000,
            local_addr: LOCAL,
            local_port: 80,
        }
    }

    #[test]
    fn test_syn_creates_connection() {
        let (mut server, accepted, _) = server(config());
        let mut net = RecordingNet::default();
        let now = Instant::now();

        server
            .on_segment(&mut net, now, REMOTE, LOCAL, &segment(1000, 0, TcpFlags::SYN, &[]))
            .unwrap();

        assert_eq!(*accepted.lock().unwrap(), vec![id()]);
        assert_eq!(net.sent.len(), 1);
        let reply = net.sent[0];
        assert_eq!(reply.flags, TcpFlags::SYN | TcpFlags::ACK);
        assert_eq!(reply.ack, 1001);
        assert_eq!(reply.src_port, 80);
        assert_eq!(reply.dst_port, 40000);

        let conn = server.connection(id()).unwrap();
        assert_eq!(conn.iss(), reply.seq);
        assert_eq!(conn.rcv_nxt(), 1001);
    }

    #[test]
    fn test_seeded_iss_is_reproducible() {
        let now = Instant::now();
        let mut isns = Vec::new();
        for _ in 0..2 {
            let (mut server, _, _) = server(config());
            let mut net = RecordingNet::default();
            server
                .on_segment(&mut net, now, REMOTE, LOCAL, &segment(1, 0, TcpFlags::SYN, &[]))
                .unwrap();
            isns.push(net.sent[0].seq);
        }
        assert_eq!(isns[0], isns[1]);
    }

    #[test]
    fn test_duplicate_syn_resends_syn_ack() {
        let (mut server, accepted, _) = server(config());
        let mut net = RecordingNet::default();
        let now = Instant::now();
        let syn = segment(1000, 0, TcpFlags::SYN, &[]);

        server.on_segment(&mut net, now, REMOTE, LOCAL, &syn).unwrap();
        server.on_segment(&mut net, now, REMOTE, LOCAL, &syn).unwrap();

        assert_eq!(accepted.lock().unwrap().len(), 1);
        assert_eq!(net.sent.len(), 2);
        assert_eq!(net.sent[0], net.sent[1]);
    }

    #[test]
    fn test_retried_syn_after_failed_reply() {
        let (mut server, accepted, delivered) = server(config());
        let mut net = RecordingNet {
            unreachable: true,
            ..Default::default()
        };
        let now = Instant::now();
        let syn = segment(1000, 0, TcpFlags::SYN, &[]);

        assert!(server.on_segment(&mut net, now, REMOTE, LOCAL, &syn).is_err());
        assert_eq!(*accepted.lock().unwrap(), vec![id()]);

        net.unreachable = false;
        server.on_segment(&mut net, now, REMOTE, LOCAL, &syn).unwrap();
        assert_eq!(net.sent.len(), 1);
        assert_eq!(net.sent[0].flags, TcpFlags::SYN | TcpFlags::ACK);

        let iss = net.sent[0].seq;
        server
            .on_segment(
                &mut net,
                now,
                REMOTE,
                LOCAL,
                &segment(1001, iss.wrapping_add(1), TcpFlags::ACK, b"data"),
            )
            .unwrap();
        assert_eq!(*delivered.lock().unwrap(), vec![b"data".to_vec()]);
        assert_eq!(accepted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_syn_after_close_reopens() {
        let (mut server, accepted, delivered) = server(config());
        let mut net = RecordingNet::default();
        let now = Instant::now();

        server
            .on_segment(&mut net, now, REMOTE, LOCAL, &segment(1000, 0, TcpFlags::SYN, &[]))
            .unwrap();
        server.close(&mut net, id()).unwrap();
        assert_eq!(*delivered.lock().unwrap(), vec![Vec::<u8>::new()]);

        server
            .on_segment(&mut net, now, REMOTE, LOCAL, &segment(1000, 0, TcpFlags::SYN, &[]))
            .unwrap();
        assert_eq!(accepted.lock().unwrap().len(), 2);
        assert!(server.connection(id()).unwrap().is_open());
    }

    #[test]
    fn test_wrong_port_dropped_silently() {
        let (mut server, accepted, _) = server(config());
        let mut net = RecordingNet::default();
        let syn = TcpHeader::new(40000, 81, 1000, 0, TcpFlags::SYN).emit(&[], REMOTE, LOCAL);

        server
            .on_segment(&mut net, Instant::now(), REMOTE, LOCAL, &syn)
            .unwrap();
        assert!(accepted.lock().unwrap().is_empty());
        assert!(net.sent.is_empty());
    }

    #[test]
    fn test_bad_checksum_dropped_unless_ignored() {
        let mut syn = segment(1000, 0, TcpFlags::SYN, &[]);
        syn[16] ^= 0x55;

        let (mut strict, accepted, _) = server(config());
        let mut net = RecordingNet::default();
        strict
            .on_segment(&mut net, Instant::now(), REMOTE, LOCAL, &syn)
            .unwrap();
        assert!(accepted.lock().unwrap().is_empty());

        let lenient_config = TransportBuilder::new().ignore_checksum(true).build();
        let (mut lenient, accepted, _) = server(lenient_config);
        lenient
            .on_segment(&mut net, Instant::now(), REMOTE, LOCAL, &syn)
            .unwrap();
        assert_eq!(accepted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_connection_dropped() {
        let (mut server, _, delivered) = server(config());
        let mut net = RecordingNet::default();

        server
            .on_segment(
                &mut net,
                Instant::now(),
                REMOTE,
                LOCAL,
                &segment(1001, 1, TcpFlags::ACK, b"stray"),
            )
            .unwrap();
        assert!(net.sent.is_empty());
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_dropped() {
        let (mut server, _, _) = server(config());
        let mut net = RecordingNet::default();
        server
            .on_segment(&mut net, Instant::now(), REMOTE, LOCAL, &[0u8; 7])
            .unwrap();
        assert!(net.sent.is_empty());
    }

    #[test]
    fn test_data_dispatched_to_connection() {
        let (mut server, _, delivered) = server(config());
        let mut net = RecordingNet::default();
        let now = Instant::now();

        server
            .on_segment(&mut net, now, REMOTE, LOCAL, &segment(1000, 0, TcpFlags::SYN, &[]))
            .unwrap();
        let iss = net.sent[0].seq;
        server
            .on_segment(
                &mut net,
                now,
                REMOTE,
                LOCAL,
                &segment(1001, iss.wrapping_add(1), TcpFlags::ACK, b"ping"),
            )
            .unwrap();

        assert_eq!(*delivered.lock().unwrap(), vec![b"ping".to_vec()]);
        assert_eq!(net.sent[1].ack, 1005);
    }

    #[test]
    fn test_unknown_id_operations_fail() {
        let (mut server, _, _) = server(config());
        let mut net = RecordingNet::default();

        let err = server.send(&mut net, id(), b"x", Instant::now()).unwrap_err();
        assert!(matches!(err, TransportError::UnknownConnection(_)));
        let err = server.close(&mut net, id()).unwrap_err();
        assert!(matches!(err, TransportError::UnknownConnection(_)));
    }

    #[test]
    fn test_no_route_surfaces_to_caller() {
        let (mut server, accepted, _) = server(config());
        let mut net = RecordingNet {
            unreachable: true,
            ..Default::default()
        };

        let err = server
            .on_segment(
                &mut net,
                Instant::now(),
                REMOTE,
                LOCAL,
                &segment(1000, 0, TcpFlags::SYN, &[]),
            )
            .unwrap_err();
        assert!(matches!(err, NetworkError::NoRoute(addr) if addr == REMOTE));
        assert_eq!(*accepted.lock().unwrap(), vec![id()]);
        assert!(server.connection(id()).is_some());
    }

    #[test]
    fn test_timers_and_reaping() {
        let config = TransportBuilder::new()
            .initial_rto(Duration::from_millis(200))
            .rng_seed(1)
            .build();
        let (mut server, _, _) = server(config);
        let mut net = RecordingNet::default();
        let now = Instant::now();

        assert!(server.next_deadline().is_none());
        server
            .on_segment(&mut net, now, REMOTE, LOCAL, &segment(1000, 0, TcpFlags::SYN, &[]))
            .unwrap();
        server.send(&mut net, id(), b"payload", now).unwrap();

        let deadline = server.next_deadline().unwrap();
        assert_eq!(deadline, now + Duration::from_millis(200));

        server.poll_timers(&mut net, deadline).unwrap();
        assert_eq!(net.sent.len(), 3);
        assert_eq!(net.sent[1].seq, net.sent[2].seq);

        assert_eq!(server.reap_closed(), 0);
        server.close(&mut net, id()).unwrap();
        assert!(server.next_deadline().is_none());
        assert_eq!(server.reap_closed(), 1);
        assert_eq!(server.connections().count(), 0);
    }

    #[test]
    fn test_builder_clamps() {
        let config = TransportBuilder::new()
            .mss(0)
            .rto_bounds(Duration::from_secs(2), Duration::from_secs(1))
            .build();
        assert_eq!(config.mss, 1);
        assert_eq!(config.max_rto, Duration::from_secs(2));

        let config = TransportBuilder::new().mss(100_000).build();
        assert_eq!(config.mss, MAX_MSS);
        assert_eq!(MAX_MSS + 40, u16::MAX as usize);
    }
}
