//! TCP transport with optional TLS.
//!
//! [`TcpTransport`] is the production [`Connect`] implementation. Host names
//! are resolved to IPv4 addresses only, the socket is a blocking
//! `std::net::TcpStream` and TLS is provided by `rustls`.
//!
//! No read or write timeout is configured: a stalled peer blocks the calling
//! thread until the session is shut down from elsewhere.

mod tls;

pub use tls::TlsVerification;

use super::error::Error;
use super::{Close, Connect, Connection, Read, Shutdown, Write};
use parking_lot::Mutex;
use rustls::ClientConnection;
use std::io::{self, Read as _, Write as _};
use std::net::{Shutdown as NetShutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;

const RAW_READ_LEN: usize = 4096;

/// Opens TCP sessions, wrapping them in TLS when asked to.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    verification: TlsVerification,
}

impl TcpTransport {
    /// A transport that does not verify server certificates.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport with the given certificate policy.
    pub fn with_verification(verification: TlsVerification) -> Self {
        Self { verification }
    }

    /// The certificate policy applied to TLS sessions.
    pub fn verification(&self) -> TlsVerification {
        self.verification
    }
}

fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, Error> {
    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        log::error!("[net] DNS lookup for {host} failed: {e}");
        Error::ResolutionError
    })?;
    addrs.into_iter().find(SocketAddr::is_ipv4).ok_or_else(|| {
        log::error!("[net] {host} has no IPv4 address");
        Error::ResolutionError
    })
}

impl Connect for TcpTransport {
    type Connection = Session;

    fn connect(&self, host: &str, port: u16, secure: bool) -> Result<Session, Error> {
        let addr = resolve_ipv4(host, port)?;
        log::debug!("[net] connecting to {host} ({addr})");
        let mut tcp = TcpStream::connect(addr).map_err(|e| {
            log::error!("[net] connect to {addr} failed: {e}");
            Error::ConnectionError
        })?;
        let _ = tcp.set_nodelay(true);

        let tls = if secure {
            let conn = tls::handshake(self.verification, host, &mut tcp)?;
            Some(Arc::new(Mutex::new(conn)))
        } else {
            None
        };
        Ok(Session { tcp, tls, raw: vec![0; RAW_READ_LEN] })
    }
}

/// One open TCP session, plain or TLS.
pub struct Session {
    tcp: TcpStream,
    tls: Option<Arc<Mutex<ClientConnection>>>,
    raw: Vec<u8>,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.tcp.peer_addr().ok())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl Read for Session {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match &self.tls {
            None => match self.tcp.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if is_closed(&e) => Ok(0),
                Err(_) => Err(Error::ReadError),
            },
            Some(tls) => tls::read(&mut self.tcp, tls, &mut self.raw, buf),
        }
    }
}

impl Write for Session {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        write_to(&self.tcp, self.tls.as_deref(), buf)
    }

    fn flush(&mut self) -> Result<(), Error> {
        (&self.tcp).flush().map_err(|_| Error::WriteError)
    }
}

impl Close for Session {
    type Error = Error;

    fn close(self) -> Result<(), Error> {
        shutdown(&self.tcp, self.tls.as_deref());
        Ok(())
    }
}

impl Connection for Session {
    type Writer = SessionWriter;

    fn writer(&self) -> Result<SessionWriter, Error> {
        let tcp = self.tcp.try_clone().map_err(|_| Error::NotOpen)?;
        Ok(SessionWriter { tcp, tls: self.tls.clone() })
    }
}

/// Write half of a [`Session`].
pub struct SessionWriter {
    tcp: TcpStream,
    tls: Option<Arc<Mutex<ClientConnection>>>,
}

impl core::fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionWriter").field("tls", &self.tls.is_some()).finish()
    }
}

impl Write for SessionWriter {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        write_to(&self.tcp, self.tls.as_deref(), buf)
    }

    fn flush(&mut self) -> Result<(), Error> {
        (&self.tcp).flush().map_err(|_| Error::WriteError)
    }
}

impl Shutdown for SessionWriter {
    fn shutdown(&self) {
        shutdown(&self.tcp, self.tls.as_deref());
    }
}

fn write_to(tcp: &TcpStream, tls: Option<&Mutex<ClientConnection>>, buf: &[u8]) -> Result<usize, Error> {
    match tls {
        None => {
            let mut tcp = tcp;
            tcp.write(buf).map_err(|_| Error::WriteError)
        }
        Some(tls) => tls::write(tcp, tls, buf),
    }
}

fn shutdown(tcp: &TcpStream, tls: Option<&Mutex<ClientConnection>>) {
    if let Some(tls) = tls {
        tls::close_notify(tcp, tls);
    }
    let _ = tcp.shutdown(NetShutdown::Both);
}

fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::UnexpectedEof
    )
}
