//! # carmeleon-client - device client stack
//!
//! Lets a connected device talk to its backend over HTTP(S) and WebSocket,
//! with cookies persisted between boots and an encrypted request/response
//! call on top.
//!
//! ## Features
//!
//! ### Network Protocols
//! - **HTTP Engine**: one-request-per-connection HTTP/1.1 with redirects and
//!   a persistent cookie jar
//! - **WebSocket**: background receive loop, auto ping/pong, MessagePack
//!   messages and server-driven redirects
//! - **RPC**: JSON or form requests whose replies may be AES-256-CBC sealed
//!   with a time-derived passphrase
//!
//! ### Storage Abstraction
//! - Path-keyed byte store with file-backed and in-memory implementations
//! - Deferred mounting for stores with a slow first initialization
//!
//! ### System Utilities
//! - Clock abstraction with a bounded wait for time synchronization
//!
//! ### Updates
//! - Callback-driven OTA download into a platform sink
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carmeleon_client::client::Client;
//! use carmeleon_client::storage::FileStore;
//!
//! let store = FileStore::mount("/var/lib/device", &["/cookies"])?;
//! let client = Client::with_store(Arc::new(store));
//!
//! let mut http = client.http();
//! http.open("https://example.com/status").unwrap();
//! let status = http.get().unwrap();
//! println!("{status}: {}", http.response().text());
//! # Ok::<(), carmeleon_client::storage::Error>(())
//! ```
//!
//! ## Logging
//!
//! Everything is reported through the [`log`] facade with a bracketed
//! component prefix (`[http]`, `[ws]`, `[cookie]`, ...). No logger is
//! installed by the crate.
//!
//! ## Optional Features
//!
//! - `defmt`: `defmt::Format` implementations for the error types

#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://docs.rs/carmeleon-client/")]

/// Network abstraction layer: connection traits, TCP/TLS transport and the
/// HTTP, WebSocket and RPC protocols.
pub mod network;

/// Storage abstraction layer for persisted client state.
pub mod storage;

/// System utilities, currently wall-clock time.
pub mod system;

/// Encryption envelope used by RPC replies.
pub mod crypto;

/// Persistent per-host cookie jar.
pub mod cookies;

/// Over-the-air (OTA) update download combining the HTTP engine and a
/// platform sink.
pub mod ota;

/// Facade bundling a transport, cookie jar and clock.
pub mod client;
