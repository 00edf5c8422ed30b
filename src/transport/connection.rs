//! Connection state management.
//!
//! One [`Connection`] per 4-tuple. It owns the outstanding-segment map, the
//! retransmission timer, the RTT estimator and the congestion window. Every
//! method runs to completion on the caller's thread and takes the current
//! time explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::server::DataObserver;
use super::timer::RetransmitTimer;
use super::timing::RttEstimator;
use crate::core::NetworkError;
use crate::core::constants::{IPPROTO_TCP, TCP_HEADER_LEN};
use crate::network::NetworkSend;
use crate::wire::{TcpFlags, TcpHeader};

/// Connection key: the 4-tuple as seen from this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// Peer address.
    pub remote_addr: Ipv4Addr,
    /// Peer port.
    pub remote_port: u16,
    /// Local address.
    pub local_addr: Ipv4Addr,
    /// Local (bound) port.
    pub local_port: u16,
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.remote_addr, self.remote_port, self.local_addr, self.local_port
        )
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Open, data transfer active.
    Established,
    /// Closed by either side; inbound data is ignored.
    Closed,
}

/// A sent or queued segment awaiting acknowledgment.
#[derive(Debug, Clone)]
pub struct OutstandingSegment {
    /// Wire-ready segment, checksum included.
    bytes: Vec<u8>,
    /// Whether the segment has been put on the wire at least once.
    transmitted: bool,
}

impl OutstandingSegment {
    /// Payload carried by the segment.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[TCP_HEADER_LEN..]
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len() - TCP_HEADER_LEN
    }

    /// Whether the segment carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the segment has been transmitted.
    pub fn is_transmitted(&self) -> bool {
        self.transmitted
    }
}

/// Per-connection transport state.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    phase: ConnectionPhase,

    /// Our initial sequence number, carried by the SYN+ACK.
    iss: u32,
    /// Peer's initial sequence number, from its SYN.
    irs: u32,
    /// Next sequence number to assign, extended past 2^32.
    snd_nxt: u64,
    /// Next in-order byte expected from the peer.
    rcv_nxt: u32,

    /// Unacknowledged segments keyed by extended sequence number.
    outstanding: BTreeMap<u64, OutstandingSegment>,
    timer: RetransmitTimer,
    rtt: RttEstimator,
    /// When a segment was last put on the wire.
    last_send: Option<Instant>,

    /// Congestion window in bytes, never below one MSS.
    cwnd: usize,
    /// Bytes acknowledged since the window last grew.
    acked_bytes: usize,
    /// A timeout retransmission is awaiting its first acknowledgment.
    retransmitting: bool,
    mss: usize,
}

impl Connection {
    /// Create the record for a passive open answering a SYN with sequence `irs`.
    pub fn accept(id: ConnectionId, irs: u32, iss: u32, mss: usize, rtt: RttEstimator) -> Self {
        Self {
            id,
            phase: ConnectionPhase::Established,
            iss,
            irs,
            // The SYN occupies one sequence number.
            snd_nxt: u64::from(iss) + 1,
            rcv_nxt: irs.wrapping_add(1),
            outstanding: BTreeMap::new(),
            timer: RetransmitTimer::new(),
            rtt,
            last_send: None,
            cwnd: mss,
            acked_bytes: 0,
            retransmitting: false,
            mss,
        }
    }

    /// Connection key.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Whether the connection still accepts data.
    pub fn is_open(&self) -> bool {
        self.phase == ConnectionPhase::Established
    }

    /// Our initial sequence number.
    pub fn iss(&self) -> u32 {
        self.iss
    }

    /// Peer's initial sequence number.
    pub fn irs(&self) -> u32 {
        self.irs
    }

    /// Next sequence number to be assigned, as it appears on the wire.
    pub fn snd_nxt(&self) -> u32 {
        self.snd_nxt as u32
    }

    /// Next in-order byte expected from the peer.
    pub fn rcv_nxt(&self) -> u32 {
        self.rcv_nxt
    }

    /// Congestion window in bytes.
    pub fn cwnd(&self) -> usize {
        self.cwnd
    }

    /// Maximum segment size.
    pub fn mss(&self) -> usize {
        self.mss
    }

    /// Current retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.rtt.rto()
    }

    /// RTT estimator state.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// Whether a timeout retransmission is awaiting acknowledgment.
    pub fn is_retransmitting(&self) -> bool {
        self.retransmitting
    }

    /// Pending retransmission deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Outstanding segments in sequence order, keyed by wire sequence number.
    pub fn outstanding(&self) -> impl Iterator<Item = (u32, &OutstandingSegment)> + '_ {
        self.outstanding
            .iter()
            .map(|(&seq, segment)| (seq as u32, segment))
    }

    /// Number of unacknowledged segments.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    /// Send (or resend) the SYN+ACK answering the peer's SYN.
    pub fn send_syn_ack<N>(&mut self, net: &mut N) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        let segment = self.segment(self.iss, TcpFlags::SYN | TcpFlags::ACK, &[]);
        net.send(&segment, self.id.remote_addr, IPPROTO_TCP)
    }

    /// Process an inbound segment for this connection.
    pub fn on_segment<N>(
        &mut self,
        net: &mut N,
        header: &TcpHeader,
        payload: &[u8],
        now: Instant,
        observer: &mut dyn DataObserver,
    ) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        if header.flags.contains(TcpFlags::ACK) && !self.outstanding.is_empty() {
            self.on_ack(net, header.ack, now)?;
        }
        self.retransmitting = false;

        let fin = header.flags.contains(TcpFlags::FIN);
        if header.seq != self.rcv_nxt || (payload.is_empty() && !fin) || !self.is_open() {
            trace!(
                id = %self.id,
                seq = header.seq,
                expected = self.rcv_nxt,
                len = payload.len(),
                "segment not accepted"
            );
            return Ok(());
        }

        self.rcv_nxt = self
            .rcv_nxt
            .wrapping_add(payload.len() as u32)
            .wrapping_add(u32::from(fin));
        if !payload.is_empty() {
            observer.data_received(self.id, payload);
        }

        let ack = self.segment(self.snd_nxt as u32, TcpFlags::ACK, &[]);
        net.send(&ack, self.id.remote_addr, IPPROTO_TCP)?;

        if fin {
            debug!(id = %self.id, "peer closed connection");
            self.close(net, observer)?;
        }
        Ok(())
    }

    /// Queue `data` and transmit what the congestion window admits.
    ///
    /// Data is sliced into MSS-sized segments appended after anything already
    /// outstanding.
    pub fn send<N>(&mut self, net: &mut N, data: &[u8], now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        if !self.is_open() || data.is_empty() {
            return Ok(());
        }

        for chunk in data.chunks(self.mss) {
            let seq = self.snd_nxt;
            let bytes = self.segment(seq as u32, TcpFlags::ACK, chunk);
            self.outstanding.insert(
                seq,
                OutstandingSegment {
                    bytes,
                    transmitted: false,
                },
            );
            self.snd_nxt += chunk.len() as u64;
        }
        trace!(id = %self.id, len = data.len(), queued = self.outstanding.len(), "data queued");

        if self.retransmitting {
            self.retransmit_oldest(net, now)
        } else {
            self.transmit_window(net, now)
        }
    }

    /// Retransmission timer fired.
    pub fn on_timeout<N>(&mut self, net: &mut N, now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        if self.outstanding.is_empty() {
            self.timer.cancel();
            return Ok(());
        }

        self.retransmitting = true;
        self.cwnd = (self.cwnd / self.mss / 2 * self.mss).max(self.mss);
        debug!(id = %self.id, cwnd = self.cwnd, rto = ?self.rtt.rto(), "retransmission timeout");
        self.retransmit_oldest(net, now)
    }

    /// Fire the retransmission timer if its deadline has passed.
    pub fn poll<N>(&mut self, net: &mut N, now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        if self.timer.is_expired(now) {
            self.on_timeout(net, now)?;
        }
        Ok(())
    }

    /// Close the connection. Idempotent.
    ///
    /// Signals end-of-stream to the observer with an empty payload, drops
    /// unacknowledged data and sends FIN.
    pub fn close<N>(&mut self, net: &mut N, observer: &mut dyn DataObserver) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        if !self.is_open() {
            return Ok(());
        }

        observer.data_received(self.id, &[]);
        self.phase = ConnectionPhase::Closed;
        self.outstanding.clear();
        self.timer.cancel();
        self.acked_bytes = 0;
        self.retransmitting = false;

        let fin = self.segment(self.snd_nxt as u32, TcpFlags::FIN | TcpFlags::ACK, &[]);
        self.snd_nxt += 1;
        debug!(id = %self.id, "connection closed");
        net.send(&fin, self.id.remote_addr, IPPROTO_TCP)
    }

    fn on_ack<N>(&mut self, net: &mut N, ack: u32, now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        let Some(ack) = self.extend_ack(ack) else {
            trace!(id = %self.id, ack, "ack outside send window");
            return Ok(());
        };
        if ack <= self.snd_una() {
            return Ok(());
        }

        // Karn: a sample following a retransmission is ambiguous.
        if !self.retransmitting {
            if let Some(sent) = self.last_send {
                self.rtt.update(now.saturating_duration_since(sent));
            }
        }

        while let Some(entry) = self.outstanding.first_entry() {
            let len = entry.get().len();
            if *entry.key() + len as u64 > ack {
                break;
            }
            self.acked_bytes += len;
            entry.remove();
        }

        if self.outstanding.is_empty() {
            self.timer.cancel();
        } else {
            self.timer.arm(now, self.rtt.rto());
        }

        if self.acked_bytes >= self.cwnd || self.outstanding.is_empty() {
            self.cwnd += self.mss;
            self.acked_bytes = 0;
            trace!(id = %self.id, cwnd = self.cwnd, "congestion window grown");
            if !self.outstanding.is_empty() {
                self.retransmit_oldest(net, now)?;
            }
        }

        self.transmit_window(net, now)
    }

    /// Oldest unacknowledged sequence number.
    fn snd_una(&self) -> u64 {
        self.outstanding
            .keys()
            .next()
            .copied()
            .unwrap_or(self.snd_nxt)
    }

    /// Extend a wire acknowledgment number, or `None` if it is outside
    /// `[snd_una, snd_nxt]`.
    fn extend_ack(&self, ack: u32) -> Option<u64> {
        let una = self.snd_una();
        let ack = una + u64::from(ack.wrapping_sub(una as u32));
        (ack <= self.snd_nxt).then_some(ack)
    }

    /// Send every not-yet-transmitted segment inside the congestion window.
    fn transmit_window<N>(&mut self, net: &mut N, now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        let remote = self.id.remote_addr;
        let mut in_window = 0;
        let mut sent = false;
        let mut result = Ok(());

        for segment in self.outstanding.values_mut() {
            if in_window >= self.cwnd {
                break;
            }
            if !segment.transmitted {
                if let Err(e) = net.send(&segment.bytes, remote, IPPROTO_TCP) {
                    result = Err(e);
                    break;
                }
                segment.transmitted = true;
                sent = true;
            }
            in_window += segment.len();
        }

        if sent {
            self.last_send = Some(now);
        }
        // Outstanding data always has a deadline, even when nothing left.
        if sent || (result.is_err() && !self.timer.is_armed()) {
            self.timer.arm(now, self.rtt.rto());
        }
        result
    }

    fn retransmit_oldest<N>(&mut self, net: &mut N, now: Instant) -> Result<(), NetworkError>
    where
        N: NetworkSend + ?Sized,
    {
        let Some(segment) = self.outstanding.values_mut().next() else {
            self.timer.cancel();
            return Ok(());
        };

        // Armed before sending so a failed send still pushes the deadline out.
        self.timer.arm(now, self.rtt.rto());
        net.send(&segment.bytes, self.id.remote_addr, IPPROTO_TCP)?;
        segment.transmitted = true;
        self.last_send = Some(now);
        Ok(())
    }

    fn segment(&self, seq: u32, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
        TcpHeader::new(self.id.local_port, self.id.remote_port, seq, self.rcv_nxt, flags).emit(
            payload,
            self.id.local_addr,
            self.id.remote_addr,
        )
    }
}
