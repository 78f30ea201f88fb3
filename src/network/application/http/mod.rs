//! HTTP/1.1 client.
//!
//! [`HttpEngine`] is a blocking, one-request-per-connection client that runs
//! over any [`Connect`](crate::network::Connect) transport. It is the
//! foundation the WebSocket channel, the RPC client and the OTA updater are
//! built on.
//!
//! # Features
//!
//! - `http`, `https`, `ws` and `wss` URLs (`ws(s)` connect like `http(s)` so
//!   the upgrade request can be sent)
//! - GET, POST, PUT, PATCH, DELETE and HEAD
//! - Case-insensitive request and response headers, with every value of a
//!   repeated response header kept
//! - Cookies attached and recorded through a shared
//!   [`CookieJar`](crate::cookies::CookieJar)
//! - GET follows up to [`MAX_REDIRECTS`] `301`/`302` hops
//!
//! # Limitations
//!
//! The body is read until the server closes the connection. Chunked transfer
//! encoding is not decoded and `Content-Length` does not bound the read.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carmeleon_client::cookies::CookieJar;
//! use carmeleon_client::network::application::http::HttpEngine;
//! use carmeleon_client::network::transport::TcpTransport;
//! use carmeleon_client::storage::MemoryStore;
//! use carmeleon_client::system::clock::SystemClock;
//!
//! let jar = Arc::new(CookieJar::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock)));
//! let mut http = HttpEngine::new(TcpTransport::new(), jar);
//!
//! http.open("https://example.com/api/status")?;
//! http.set_header("Accept", "application/json");
//! let status = http.get()?;
//! println!("{status}: {}", http.response().text());
//! # Ok::<(), carmeleon_client::network::error::Error>(())
//! ```

/// The request engine and response types.
pub mod client;

/// Request and response header collections.
pub mod headers;

/// URL parsing and redirect resolution.
pub mod url;

pub use client::{HttpEngine, MAX_REDIRECTS, Method, Response, Upgraded};
pub use headers::{RequestHeaders, ResponseHeaders};
pub use url::{Scheme, Url};
