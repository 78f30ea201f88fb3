//! # Application Layer Protocols
//!
//! Protocol clients built on the [`Connect`](crate::network::Connect) and
//! [`Connection`](crate::network::Connection) traits.
//!
//! ## Available Protocols
//!
//! - **[`http`]**: HTTP/1.1 engine with cookies and redirect following
//! - **[`websocket`]**: WebSocket channel with a background receive loop
//! - **[`rpc`]**: encrypted request/response calls over [`http`]
//!
//! All of them take a transport by value, so tests swap in a scripted
//! in-memory one and production code uses
//! [`TcpTransport`](crate::network::transport::TcpTransport).

/// HTTP client implementation.
///
/// One request per connection, with cookies persisted through the shared
/// [`CookieJar`](crate::cookies::CookieJar).
pub mod http;

/// Encrypted RPC calls.
pub mod rpc;

/// WebSocket protocol implementation.
///
/// Upgrades an HTTP connection and exchanges text, binary and MessagePack
/// messages.
pub mod websocket;
