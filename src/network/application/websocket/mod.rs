//! WebSocket client.
//!
//! [`WebSocketChannel`] upgrades an [`HttpEngine`](super::http::HttpEngine)
//! connection and runs a background receive loop that reports to a
//! [`WsEvents`] sink. Binary messages are additionally decoded as MessagePack
//! into [`serde_json::Value`]s, which is also how the server issues
//! application-level redirects:
//!
//! ```text
//! server ──► {"redirect": "/room/7"}   (MessagePack, binary frame)
//! client ──► closes, reconnects to wss://<same host>/room/7 (keep-alive on)
//! ```
//!
//! # Compatibility
//!
//! Outgoing frames are unmasked by default, which RFC 6455 forbids for
//! clients. The servers this client talks to rely on it; set
//! [`WsOptions::mask_outgoing`] for standard-conforming servers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carmeleon_client::cookies::CookieJar;
//! use carmeleon_client::network::application::http::HttpEngine;
//! use carmeleon_client::network::application::websocket::{ChannelEvents, WebSocketChannel, WsEvent};
//! use carmeleon_client::network::transport::TcpTransport;
//! use carmeleon_client::storage::MemoryStore;
//! use carmeleon_client::system::clock::SystemClock;
//!
//! let jar = Arc::new(CookieJar::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock)));
//! let (events, rx) = ChannelEvents::unbounded();
//! let ws = WebSocketChannel::new(
//!     HttpEngine::new(TcpTransport::new(), jar),
//!     "wss://example.com/socket",
//!     Arc::new(events),
//! );
//! ws.set_keep_alive(true);
//! ws.start()?;
//! ws.send_text("hello")?;
//! while let Ok(event) = rx.recv() {
//!     if let WsEvent::Text(text) = event {
//!         println!("got {text}");
//!         break;
//!     }
//! }
//! ws.close();
//! # Ok::<(), carmeleon_client::network::error::Error>(())
//! ```

mod channel;
mod events;

/// Frame codec.
pub mod frame;

pub use channel::{ChannelState, DEFAULT_MAX_PAYLOAD, WebSocketChannel, WsOptions};
pub use events::{ChannelEvents, NoEvents, WsEvent, WsEvents, hex_dump};
pub use frame::{Frame, Opcode};
