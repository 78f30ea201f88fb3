//! # Storage abstraction layer for the client stack
//!
//! The client persists a small amount of state between boots, most notably the
//! per-host cookie files. This module defines the byte-store interface that
//! state is written through, together with the implementations shipped with
//! the crate.
//!
//! # Design Philosophy
//!
//! - **Medium Agnostic**: the stack only needs path-like keys mapped to byte
//!   blobs, so flash filesystems, SD cards and host directories all fit
//! - **Shareable**: stores take `&self` and are `Send + Sync`, so one store can
//!   back every engine in the process
//! - **Explicit Mounting**: a store that needs a slow one-time initialization
//!   is wrapped in [`Deferred`], which blocks callers until it is ready
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │    CookieJar    │    │   Application   │
//! └─────────────────┘    └─────────────────┘
//!           │                      │
//!           ▼                      ▼
//! ┌─────────────────────────────────────────┐
//! │             KeyValueStore               │
//! └─────────────────────────────────────────┘
//!      │               │               │
//!      ▼               ▼               ▼
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │FileStore │   │MemoryStore │   │ Deferred<S>  │
//! └──────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! # Keys
//!
//! Keys are absolute, `/`-separated paths such as `/cookies/example.com.json`.
//! Empty keys and keys containing `..` segments are rejected with
//! [`Error::InvalidKey`](error::Error::InvalidKey).
//!
//! # Usage Examples
//!
//! ```rust
//! use carmeleon_client::storage::{KeyValueStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.mkdir("/cookies").unwrap();
//! store.write("/cookies/example.com.json", b"[]").unwrap();
//!
//! assert!(store.exists("/cookies/example.com.json"));
//! assert_eq!(store.list("/cookies").unwrap(), vec!["example.com.json".to_string()]);
//! ```

#![deny(unsafe_code)]

/// Common error types for storage operations
pub mod error;

mod file;
mod memory;
mod mount;

#[cfg(test)]
mod tests;

pub use error::Error;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use mount::Deferred;

/// A byte store addressed by path-like keys.
///
/// This is the persistence collaborator of the client stack. Implementations
/// must be safe to call from several threads, but callers that perform a
/// read-modify-write sequence are responsible for serializing it themselves
/// (the cookie jar does so per host).
///
/// # Examples
///
/// ```rust
/// use carmeleon_client::storage::{KeyValueStore, MemoryStore};
///
/// fn bump_counter<S: KeyValueStore>(store: &S) -> Result<u8, carmeleon_client::storage::Error> {
///     let current = store.read("/counter")?.and_then(|b| b.first().copied()).unwrap_or(0);
///     store.write("/counter", &[current + 1])?;
///     Ok(current + 1)
/// }
///
/// let store = MemoryStore::new();
/// assert_eq!(bump_counter(&store).unwrap(), 1);
/// assert_eq!(bump_counter(&store).unwrap(), 2);
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Read the whole file stored under `key`.
    ///
    /// Returns `Ok(None)` when no such file exists.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Replace the file stored under `key` with `bytes`.
    ///
    /// Missing parent directories are created.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error>;

    /// Create a directory. Creating an existing directory is not an error.
    fn mkdir(&self, dir: &str) -> Result<(), Error>;

    /// List the names (not full keys) of the files directly inside `dir`.
    ///
    /// A missing directory lists as empty.
    fn list(&self, dir: &str) -> Result<Vec<String>, Error>;

    /// Remove the file stored under `key`.
    ///
    /// Returns `Ok(true)` if a file was removed and `Ok(false)` if there was
    /// nothing to remove.
    fn remove(&self, key: &str) -> Result<bool, Error>;

    /// Check whether a file or directory exists under `key`.
    fn exists(&self, key: &str) -> bool;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        (**self).read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        (**self).write(key, bytes)
    }

    fn mkdir(&self, dir: &str) -> Result<(), Error> {
        (**self).mkdir(dir)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, Error> {
        (**self).list(dir)
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        (**self).remove(key)
    }

    fn exists(&self, key: &str) -> bool {
        (**self).exists(key)
    }
}

/// Normalize a key to the `/a/b` form, rejecting empty keys and `..` segments.
pub(crate) fn normalize_key(key: &str) -> Result<String, Error> {
    let mut normalized = String::with_capacity(key.len() + 1);
    for segment in key.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            return Err(Error::InvalidKey);
        }
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        return Err(Error::InvalidKey);
    }
    Ok(normalized)
}

/// Split a normalized key into its parent directory and file name.
pub(crate) fn split_key(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(0) => ("/", &key[1..]),
        Some(idx) => (&key[..idx], &key[idx + 1..]),
        None => ("/", key),
    }
}
