//! One entry point for the whole stack.
//!
//! A [`Client`] owns a transport and a cookie jar. Every engine it hands out
//! connects through a clone of that transport and shares the jar, so a cookie
//! set by an HTTP response is sent by the next WebSocket upgrade to the same
//! host.

use crate::cookies::CookieJar;
use crate::network::Connect;
use crate::network::application::http::HttpEngine;
use crate::network::application::rpc::{RpcClient, RpcOptions, SecretDerivation};
use crate::network::application::websocket::{WebSocketChannel, WsEvents, WsOptions};
use crate::network::transport::TcpTransport;
use crate::ota::{OtaEvents, OtaUpdater, Platform};
use crate::storage::KeyValueStore;
use crate::system::clock::{Clock, SystemClock};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Client<T> {
    transport: T,
    cookies: Arc<CookieJar>,
}

impl Client<TcpTransport> {
    /// TCP/TLS transport and the system clock, persisting cookies in `store`.
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(TcpTransport::new(), store, Arc::new(SystemClock))
    }
}

impl<T: Connect + Clone> Client<T> {
    pub fn new(transport: T, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_jar(transport, Arc::new(CookieJar::new(store, clock)))
    }

    /// Shares an existing jar, for example with another client.
    pub fn with_jar(transport: T, cookies: Arc<CookieJar>) -> Self {
        Self { transport, cookies }
    }

    pub fn cookies(&self) -> &Arc<CookieJar> {
        &self.cookies
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.cookies.clock()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn http(&self) -> HttpEngine<T> {
        HttpEngine::new(self.transport.clone(), self.cookies.clone())
    }

    pub fn rpc(&self, secret: Arc<dyn SecretDerivation>) -> RpcClient<T> {
        RpcClient::new(self.http(), secret)
    }

    pub fn rpc_with_options(&self, secret: Arc<dyn SecretDerivation>, options: RpcOptions) -> RpcClient<T> {
        RpcClient::with_options(self.http(), secret, options)
    }

    pub fn ota<P: Platform>(&self, platform: P, events: Arc<dyn OtaEvents>) -> OtaUpdater<T, P> {
        OtaUpdater::new(self.http(), platform, events)
    }
}

impl<T: Connect + Clone + 'static> Client<T> {
    /// A channel for `url`; nothing connects until
    /// [`start`](WebSocketChannel::start).
    pub fn websocket(&self, url: &str, events: Arc<dyn WsEvents>) -> WebSocketChannel<T> {
        WebSocketChannel::new(self.http(), url, events)
    }

    pub fn websocket_with_options(
        &self,
        url: &str,
        events: Arc<dyn WsEvents>,
        options: WsOptions,
    ) -> WebSocketChannel<T> {
        WebSocketChannel::with_options(self.http(), url, events, options)
    }
}
