//! Tokio event loop for a [`Stack`].
//!
//! The driver owns the stack and serializes three event sources onto it:
//! bytes from physical links, application commands, and the earliest
//! retransmission deadline.

use std::io;
use std::net::Ipv4Addr;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::StackError;
use super::stack::Stack;
use crate::link::PhysicalLink;
use crate::transport::ConnectionId;

/// Read buffer size for stream links.
const STREAM_READ_BUFFER: usize = 4096;

/// Physical link backed by an unbounded channel.
///
/// Frames written by the stack appear on the paired receiver, to be moved
/// onto a real transport by whoever holds it.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl PhysicalLink for ChannelLink {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "link receiver dropped"))
    }
}

/// Create a channel link and the receiver its outbound bytes arrive on.
pub fn channel_link() -> (ChannelLink, mpsc::UnboundedReceiver<Vec<u8>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelLink { tx }, rx)
}

/// Application request executed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Queue data on a connection.
    Send {
        /// Target connection.
        id: ConnectionId,
        /// Bytes to send.
        data: Vec<u8>,
    },
    /// Close a connection.
    Close {
        /// Target connection.
        id: ConnectionId,
    },
}

/// Cloneable handle for feeding a running [`Driver`].
///
/// The driver stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    inbound: mpsc::UnboundedSender<(Ipv4Addr, Vec<u8>)>,
    commands: mpsc::UnboundedSender<Command>,
}

impl DriverHandle {
    /// Deliver bytes read from the link to `peer`.
    pub fn inbound(&self, peer: Ipv4Addr, bytes: Vec<u8>) -> Result<(), StackError> {
        self.inbound
            .send((peer, bytes))
            .map_err(|_| StackError::Config("driver stopped".into()))
    }

    /// Queue `data` on connection `id`.
    pub fn send(&self, id: ConnectionId, data: impl Into<Vec<u8>>) -> Result<(), StackError> {
        self.command(Command::Send {
            id,
            data: data.into(),
        })
    }

    /// Close connection `id`.
    pub fn close(&self, id: ConnectionId) -> Result<(), StackError> {
        self.command(Command::Close { id })
    }

    fn command(&self, command: Command) -> Result<(), StackError> {
        self.commands
            .send(command)
            .map_err(|_| StackError::Config("driver stopped".into()))
    }
}

/// Runs a [`Stack`] on the current tokio runtime.
#[derive(Debug)]
pub struct Driver<P> {
    stack: Stack<P>,
    inbound: mpsc::UnboundedReceiver<(Ipv4Addr, Vec<u8>)>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<P: PhysicalLink> Driver<P> {
    /// Wrap `stack` and return the handle that feeds it.
    pub fn new(stack: Stack<P>) -> (Self, DriverHandle) {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let driver = Self {
            stack,
            inbound,
            commands,
        };
        let handle = DriverHandle {
            inbound: inbound_tx,
            commands: commands_tx,
        };
        (driver, handle)
    }

    /// Process events until every handle is dropped, then return the stack.
    ///
    /// Errors from individual events are logged and do not stop the loop.
    pub async fn run(self) -> Stack<P> {
        let Self {
            mut stack,
            mut inbound,
            mut commands,
        } = self;

        loop {
            let deadline = stack.next_deadline();
            let timer = async move {
                match deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = inbound.recv() => match event {
                    Some((peer, bytes)) => report(stack.on_bytes(peer, &bytes, Instant::now())),
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(Command::Send { id, data }) => report(stack.send(id, &data, Instant::now())),
                    Some(Command::Close { id }) => report(stack.close(id)),
                    None => break,
                },
                () = timer => report(stack.poll(Instant::now())),
            }
        }

        debug!("driver stopped");
        stack
    }
}

fn report(result: Result<(), StackError>) {
    if let Err(e) = result {
        warn!(error = %e, "stack event failed");
    }
}

/// Pump a byte stream (serial device, pipe, socket) to and from a driver.
///
/// Bytes read from `stream` are delivered as coming from `peer`; frames from
/// `outbound` (the receiver of a [`channel_link`]) are written to it. The task
/// ends when the stream reaches EOF, the outbound channel closes, or the
/// driver stops.
pub fn spawn_stream_link<S>(
    stream: S,
    peer: Ipv4Addr,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    handle: DriverHandle,
) -> JoinHandle<io::Result<()>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buf = vec![0u8; STREAM_READ_BUFFER];

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        debug!(%peer, "stream link closed");
                        return Ok(());
                    }
                    if handle.inbound(peer, buf[..n].to_vec()).is_err() {
                        return Ok(());
                    }
                }
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        writer.write_all(&frame).await?;
                        writer.flush().await?;
                    }
                    None => return Ok(()),
                },
            }
        }
    })
}
