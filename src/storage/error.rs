//! Common error types for storage operations

/// A common error type for storage operations.
///
/// This enum defines the failures a key-value byte store can report. It is
/// kept small and `Copy` so it can cross thread boundaries freely.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum Error {
    /// The key does not name an existing file.
    #[error("no such key")]
    NotFound,
    /// An error occurred during a read operation.
    #[error("read failed")]
    ReadError,
    /// An error occurred during a write operation.
    #[error("write failed")]
    WriteError,
    /// The store was used before its one-time mount finished, or the mount failed.
    #[error("store not initialized")]
    NotInitialized,
    /// The key is empty or escapes the store namespace.
    #[error("invalid key")]
    InvalidKey,
    /// The underlying medium is unusable.
    #[error("storage fault")]
    StorageFault,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::NotInitialized => defmt::write!(f, "NotInitialized"),
            Error::InvalidKey => defmt::write!(f, "InvalidKey"),
            Error::StorageFault => defmt::write!(f, "StorageFault"),
        }
    }
}
