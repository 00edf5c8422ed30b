//! Physical link abstraction.

use std::io;

/// Anything that can carry raw bytes to one peer: a serial line, a pipe, a
/// socket.
///
/// Writes are fire-and-forget. Inbound bytes are not pulled through this
/// trait; whoever owns the transport feeds them to
/// [`Stack::on_bytes`](crate::stack::Stack::on_bytes).
pub trait PhysicalLink {
    /// Queue `bytes` for transmission.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl PhysicalLink for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<P: PhysicalLink + ?Sized> PhysicalLink for Box<P> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes)
    }
}
