//! A network abstraction layer for the client stack
//!
//! The protocol engines in [`application`] never touch sockets directly. They
//! talk to a [`Connect`] implementation that opens [`Connection`]s, which keeps
//! the engines testable against in-memory transports and lets an embedding
//! application route traffic through whatever network stack it has.
//!
//! A connection can hand out an independent [`Connection::Writer`] so that a
//! background reader (the WebSocket receive loop) and caller-driven sends can
//! run at the same time on one session.

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// TCP and TLS transport built on `std::net` and `rustls`
pub mod transport;

/// Application layer protocols: HTTP, WebSocket, RPC
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Shutdown, Write};
}

use error::Error;

/// Byte-level reads from a connection.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection. `Ok(0)` means the peer closed it.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte-level writes to a connection.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Write the whole buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), Self::Error>
    where
        Self::Error: From<Error>,
    {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(Error::WriteError.into()),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

/// Consuming close of a connection.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// Non-consuming teardown, callable from any thread holding a handle.
///
/// Shutting a session down unblocks a reader parked in [`Read::read`] on the
/// same session, which then observes end of stream.
pub trait Shutdown {
    /// Tear down both directions of the underlying session.
    fn shutdown(&self);
}

/// A synchronous connection
pub trait Connection:
    Read<Error = Error> + Write<Error = Error> + Close<Error = Error> + Send + 'static
{
    /// A write handle that can be used concurrently with reads on the
    /// connection it came from.
    type Writer: Write<Error = Error> + Shutdown + Send + 'static;

    /// Create a write handle for this connection.
    fn writer(&self) -> Result<Self::Writer, Error>;
}

/// A synchronous connector (client)
pub trait Connect: Send + Sync {
    /// Associated connection type
    type Connection: Connection;

    /// Resolve `host`, connect to `port` and, when `secure` is set, run a
    /// TLS client handshake.
    fn connect(&self, host: &str, port: u16, secure: bool) -> Result<Self::Connection, Error>;
}

impl<C: Connect + ?Sized> Connect for std::sync::Arc<C> {
    type Connection = C::Connection;

    fn connect(&self, host: &str, port: u16, secure: bool) -> Result<Self::Connection, Error> {
        (**self).connect(host, port, secure)
    }
}
