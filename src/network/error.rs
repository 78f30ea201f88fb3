//! Common error types for network operations

/// A common error type for network operations.
///
/// Every layer of the client stack (transport, HTTP, WebSocket, RPC) reports
/// failures through this enum. Variants are data-free so the type stays cheap
/// to copy around and log on constrained targets.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    #[error("connection is not open")]
    NotOpen,
    /// An error occurred during a write operation.
    #[error("write failed")]
    WriteError,
    /// An error occurred during a read operation.
    #[error("read failed")]
    ReadError,
    /// The peer closed the connection before a complete message arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// The host name could not be resolved to an IPv4 address.
    #[error("host name resolution failed")]
    ResolutionError,
    /// The TCP connection could not be established.
    #[error("connection failed")]
    ConnectionError,
    /// The TLS client handshake failed.
    #[error("TLS handshake failed")]
    TlsHandshakeError,
    /// The URL scheme is not one of `http`, `https`, `ws`, `wss`.
    #[error("unsupported URL scheme")]
    UnsupportedScheme,
    /// A protocol-specific error occurred (malformed status line, bad frame).
    #[error("protocol error")]
    ProtocolError,
    /// A frame payload exceeds what this client can send or receive.
    #[error("frame payload too large")]
    FrameTooLarge,
    /// Key derivation, cipher or envelope decoding failed.
    #[error("cryptographic operation failed")]
    CryptoError,
    /// The persistent store could not be read or written.
    #[error("storage operation failed")]
    StorageError,
    /// Caller-supplied data could not be encoded.
    #[error("invalid application data")]
    ApplicationError,
}

impl Error {
    /// Returns `true` for failures raised while opening a connection.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Error::ResolutionError
                | Error::ConnectionError
                | Error::TlsHandshakeError
                | Error::UnsupportedScheme
        )
    }
}

impl From<crate::storage::error::Error> for Error {
    fn from(_: crate::storage::error::Error) -> Self {
        Error::StorageError
    }
}

impl From<crate::crypto::Error> for Error {
    fn from(_: crate::crypto::Error) -> Self {
        Error::CryptoError
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::ResolutionError => defmt::write!(f, "ResolutionError"),
            Error::ConnectionError => defmt::write!(f, "ConnectionError"),
            Error::TlsHandshakeError => defmt::write!(f, "TlsHandshakeError"),
            Error::UnsupportedScheme => defmt::write!(f, "UnsupportedScheme"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::FrameTooLarge => defmt::write!(f, "FrameTooLarge"),
            Error::CryptoError => defmt::write!(f, "CryptoError"),
            Error::StorageError => defmt::write!(f, "StorageError"),
            Error::ApplicationError => defmt::write!(f, "ApplicationError"),
        }
    }
}
