//! rustls plumbing for [`Session`](super::Session).
//!
//! The TLS state lives behind a mutex shared by the read and write halves.
//! The reader never holds the lock while blocked on the socket: it reads raw
//! records first and only then feeds them to rustls, so a concurrent writer
//! can always make progress.

use crate::network::error::Error;
use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::io::{self, Read as _, Write as _};
use std::net::TcpStream;
use std::sync::Arc;

/// Server certificate policy for TLS sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVerification {
    /// Accept any certificate. This is what deployed devices do today; it
    /// gives encryption without authentication and is logged on every
    /// handshake.
    #[default]
    Disabled,
    /// Verify the chain against the bundled Mozilla root set.
    WebPki,
}

/// Accepts every certificate while still checking handshake signatures.
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn client_config(verification: TlsVerification) -> Result<Arc<ClientConfig>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|_| Error::TlsHandshakeError)?;
    let config = match verification {
        TlsVerification::Disabled => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
            .with_no_client_auth(),
        TlsVerification::WebPki => {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };
    Ok(Arc::new(config))
}

pub(super) fn handshake(
    verification: TlsVerification,
    host: &str,
    tcp: &mut TcpStream,
) -> Result<ClientConnection, Error> {
    if verification == TlsVerification::Disabled {
        log::warn!("[tls] certificate verification disabled for {host}");
    }
    let name = ServerName::try_from(host.to_owned()).map_err(|_| {
        log::error!("[tls] invalid server name {host}");
        Error::TlsHandshakeError
    })?;
    let mut conn = ClientConnection::new(client_config(verification)?, name).map_err(|e| {
        log::error!("[tls] session setup failed: {e}");
        Error::TlsHandshakeError
    })?;
    while conn.is_handshaking() {
        conn.complete_io(tcp).map_err(|e| {
            log::error!("[tls] handshake with {host} failed: {e}");
            Error::TlsHandshakeError
        })?;
    }
    Ok(conn)
}

pub(super) fn read(
    tcp: &mut TcpStream,
    tls: &Mutex<ClientConnection>,
    raw: &mut [u8],
    buf: &mut [u8],
) -> Result<usize, Error> {
    loop {
        {
            let mut conn = tls.lock();
            match conn.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                // Peer closed without close_notify.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                Err(_) => return Err(Error::ReadError),
            }
        }

        let n = match tcp.read(raw) {
            Ok(n) => n,
            Err(e) if super::is_closed(&e) => 0,
            Err(_) => return Err(Error::ReadError),
        };
        if n == 0 {
            return Ok(0);
        }

        let mut conn = tls.lock();
        let mut records = &raw[..n];
        while !records.is_empty() {
            conn.read_tls(&mut records).map_err(|_| Error::ReadError)?;
            conn.process_new_packets().map_err(|e| {
                log::error!("[tls] bad record: {e}");
                Error::ReadError
            })?;
        }
        // Key updates and alerts may need an answer.
        let mut out: &TcpStream = tcp;
        while conn.wants_write() {
            conn.write_tls(&mut out).map_err(|_| Error::WriteError)?;
        }
    }
}

pub(super) fn write(tcp: &TcpStream, tls: &Mutex<ClientConnection>, buf: &[u8]) -> Result<usize, Error> {
    let mut conn = tls.lock();
    conn.writer().write_all(buf).map_err(|_| Error::WriteError)?;
    let mut out = tcp;
    while conn.wants_write() {
        conn.write_tls(&mut out).map_err(|_| Error::WriteError)?;
    }
    Ok(buf.len())
}

pub(super) fn close_notify(tcp: &TcpStream, tls: &Mutex<ClientConnection>) {
    let mut conn = tls.lock();
    conn.send_close_notify();
    let mut out = tcp;
    while conn.wants_write() {
        if conn.write_tls(&mut out).is_err() {
            break;
        }
    }
}
