use super::events::{WsEvents, hex_dump};
use super::frame::{Frame, FrameReader, Opcode, encode};
use crate::network::application::http::{HttpEngine, RequestHeaders, Scheme, Url};
use crate::network::error::Error;
use crate::network::{Close, Connect, Connection, Shutdown, Write};
use base64ct::{Base64, Encoding};
use parking_lot::Mutex;
use rand::RngCore;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Largest incoming payload accepted by default.
pub const DEFAULT_MAX_PAYLOAD: usize = 4096;

/// Text message that makes the channel answer `"pong"`.
const PING_TEXT: &str = "ping";
const PONG_TEXT: &str = "pong";
/// Text message sent when the channel is closed locally.
const BYE_TEXT: &str = "bye";

type WriterOf<T> = <<T as Connect>::Connection as Connection>::Writer;
type ReaderOf<T> = FrameReader<<T as Connect>::Connection>;

/// Channel tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsOptions {
    /// Incoming frames with a larger payload abort the connection.
    pub max_payload: usize,
    /// Mask outgoing frames as RFC 6455 requires of clients. Off by default
    /// because the deployed servers expect unmasked frames.
    pub mask_outgoing: bool,
}

impl Default for WsOptions {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            mask_outgoing: false,
        }
    }
}

/// Lifecycle of a [`WebSocketChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
}

enum Flow {
    Continue,
    Stop,
    Redirect(String),
}

struct Shared<T: Connect> {
    engine: Mutex<HttpEngine<T>>,
    writer: Mutex<Option<WriterOf<T>>>,
    url: Mutex<String>,
    headers: Mutex<RequestHeaders>,
    keep_alive: AtomicBool,
    connected: AtomicBool,
    closing: AtomicBool,
    state: Mutex<ChannelState>,
    events: Arc<dyn WsEvents>,
    options: WsOptions,
}

impl<T: Connect> Shared<T> {
    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }

    /// Opens the connection, performs the upgrade and returns the read side.
    fn connect(&self) -> Result<ReaderOf<T>, Error> {
        self.set_state(ChannelState::Connecting);
        let url = self.url.lock().clone();
        let mut engine = self.engine.lock();
        engine.open(&url)?;
        for (name, value) in self.headers.lock().iter() {
            engine.set_header(name, value);
        }

        let mut key = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key);
        engine.set_header("Upgrade", "websocket");
        engine.set_header("Connection", "Upgrade");
        engine.set_header("Sec-WebSocket-Key", &Base64::encode_string(&key));
        engine.set_header("Sec-WebSocket-Version", "13");

        let upgraded = engine.upgrade()?;
        drop(engine);
        if upgraded.status != 101 {
            log::warn!("[ws] handshake with {url} answered {}", upgraded.status);
            let _ = upgraded.connection.close();
            return Err(Error::ProtocolError);
        }

        let writer = upgraded.connection.writer()?;
        {
            // Publishing under the writer lock orders this against teardown.
            let mut slot = self.writer.lock();
            if self.closing.load(Ordering::SeqCst) {
                drop(slot);
                log::info!("[ws] closed while connecting to {url}");
                writer.shutdown();
                let _ = upgraded.connection.close();
                return Err(Error::ConnectionClosed);
            }
            *slot = Some(writer);
            self.connected.store(true, Ordering::SeqCst);
        }
        self.set_state(ChannelState::Open);
        log::info!("[ws] connected to {url}");
        self.events.on_connected();
        Ok(FrameReader::new(upgraded.connection, upgraded.buffered))
    }

    /// Shuts the transport down. Fires `on_disconnected` only if the channel
    /// was connected.
    fn teardown(&self, next: ChannelState) {
        let (was_connected, writer) = {
            let mut slot = self.writer.lock();
            (self.connected.swap(false, Ordering::SeqCst), slot.take())
        };
        if let Some(writer) = writer {
            writer.shutdown();
        }
        self.engine.lock().close();
        self.set_state(next);
        if was_connected {
            self.events.on_disconnected();
        }
    }

    fn send_frame(&self, opcode: Opcode, payload: &[u8]) -> Result<(), Error> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotOpen);
        }
        let mask = self.options.mask_outgoing.then(|| {
            let mut key = [0u8; 4];
            rand::thread_rng().fill_bytes(&mut key);
            key
        });
        let bytes = encode(opcode, payload, mask)?;

        let mut writer = self.writer.lock();
        let writer = writer.as_mut().ok_or(Error::NotOpen)?;
        writer.write_all(&bytes)?;
        writer.flush()
    }

    fn dispatch(&self, frame: Frame) -> Flow {
        match frame.opcode {
            Opcode::Text => {
                let text = String::from_utf8_lossy(&frame.payload);
                self.events.on_text(&text);
                if text.eq_ignore_ascii_case(PING_TEXT) {
                    if let Err(e) = self.send_frame(Opcode::Text, PONG_TEXT.as_bytes()) {
                        log::warn!("[ws] pong reply failed: {e}");
                    }
                }
                Flow::Continue
            }
            Opcode::Binary => {
                self.events.on_binary(&frame.payload);
                let value = match rmp_serde::from_slice::<Value>(&frame.payload) {
                    Ok(value) => value,
                    Err(e) => {
                        log::debug!("[ws] binary message is not MessagePack: {e}");
                        return Flow::Continue;
                    }
                };
                if let Some(target) = value.get("redirect").and_then(Value::as_str) {
                    if self.keep_alive.load(Ordering::SeqCst) {
                        return Flow::Redirect(target.to_owned());
                    }
                    log::info!("[ws] redirect to {target} without keep-alive, closing");
                    return Flow::Stop;
                }
                self.events.on_structured(&value);
                Flow::Continue
            }
            Opcode::Close => {
                log::info!("[ws] close frame received");
                Flow::Stop
            }
            Opcode::Ping => {
                if let Err(e) = self.send_frame(Opcode::Pong, &frame.payload) {
                    log::warn!("[ws] pong frame failed: {e}");
                }
                Flow::Continue
            }
            Opcode::Pong => Flow::Continue,
            other => {
                log::warn!("[ws] unknown opcode {:#04x}", other.as_u8());
                Flow::Continue
            }
        }
    }

    /// Drops the current connection and connects to `target`.
    fn redirect(&self, target: &str) -> Result<ReaderOf<T>, Error> {
        let url = {
            let current = self.url.lock();
            match Url::parse(&current) {
                Ok(base) => base.resolve(target, &[Scheme::Ws, Scheme::Wss]),
                Err(_) => target.to_owned(),
            }
        };
        log::info!("[ws] redirect received, reconnecting to {url}");

        let keep_alive = self.keep_alive.swap(false, Ordering::SeqCst);
        self.teardown(ChannelState::Reconnecting);
        *self.url.lock() = url;
        let result = self.connect();

        // A close() during the reconnect owns keep-alive from then on.
        self.keep_alive.store(keep_alive, Ordering::SeqCst);
        let closing = self.closing.load(Ordering::SeqCst);
        if closing {
            self.keep_alive.store(false, Ordering::SeqCst);
        }

        if result.is_err() && !closing {
            self.set_state(ChannelState::Closed);
            self.events.on_disconnected();
        }
        result
    }

    fn run(self: Arc<Self>, mut reader: ReaderOf<T>) {
        while self.connected.load(Ordering::SeqCst) {
            let frame = match reader.read_frame(self.options.max_payload) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("[ws] connection closed by peer");
                    break;
                }
                Err(e) => {
                    if self.connected.load(Ordering::SeqCst) {
                        log::warn!("[ws] receive failed: {e}");
                    }
                    break;
                }
            };
            match self.dispatch(frame) {
                Flow::Continue => {}
                Flow::Stop => break,
                Flow::Redirect(target) => match self.redirect(&target) {
                    Ok(next) => {
                        let _ = std::mem::replace(&mut reader, next).into_inner().close();
                    }
                    Err(_) if self.closing.load(Ordering::SeqCst) => break,
                    Err(e) => {
                        log::error!("[ws] reconnect failed: {e}");
                        break;
                    }
                },
            }
        }
        self.teardown(ChannelState::Closed);
    }
}

/// A WebSocket client session with a background receive thread.
///
/// The channel upgrades an [`HttpEngine`] connection, then hands incoming
/// messages to a [`WsEvents`] sink from a dedicated thread. Sends may be
/// issued from any thread while the receive thread runs.
///
/// Incoming text `"ping"` (any case) is answered with `"pong"`, and control
/// pings with a pong carrying the same payload. A MessagePack message with a
/// string `redirect` field moves the session to a new URL when keep-alive is
/// enabled and ends it otherwise.
pub struct WebSocketChannel<T: Connect + 'static> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Connect + 'static> core::fmt::Debug for WebSocketChannel<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebSocketChannel")
            .field("url", &*self.shared.url.lock())
            .field("state", &*self.shared.state.lock())
            .field("keep_alive", &self.shared.keep_alive.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<T: Connect + 'static> WebSocketChannel<T> {
    pub fn new(engine: HttpEngine<T>, url: &str, events: Arc<dyn WsEvents>) -> Self {
        Self::with_options(engine, url, events, WsOptions::default())
    }

    pub fn with_options(
        engine: HttpEngine<T>,
        url: &str,
        events: Arc<dyn WsEvents>,
        options: WsOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                writer: Mutex::new(None),
                url: Mutex::new(url.to_owned()),
                headers: Mutex::new(RequestHeaders::new()),
                keep_alive: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                state: Mutex::new(ChannelState::Idle),
                events,
                options,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Adds a header sent with every handshake, including reconnects.
    pub fn set_header(&self, name: &str, value: &str) {
        self.shared.headers.lock().set(name, value);
    }

    /// Whether a server redirect should reconnect instead of closing.
    pub fn set_keep_alive(&self, enable: bool) {
        self.shared.keep_alive.store(enable, Ordering::SeqCst);
    }

    pub fn keep_alive(&self) -> bool {
        self.shared.keep_alive.load(Ordering::SeqCst)
    }

    /// The URL of the current (or next) connection.
    pub fn url(&self) -> String {
        self.shared.url.lock().clone()
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Connects, performs the upgrade and starts the receive thread.
    ///
    /// `on_connected` fires before the first message can be delivered. On
    /// failure `on_disconnected` fires and the channel is left closed.
    pub fn start(&self) -> Result<(), Error> {
        if self.is_connected() {
            return Ok(());
        }
        self.join_worker();
        self.shared.closing.store(false, Ordering::SeqCst);

        let reader = match self.shared.connect() {
            Ok(reader) => reader,
            Err(e) => {
                log::error!("[ws] start failed: {e}");
                self.shared.set_state(ChannelState::Closed);
                self.shared.events.on_disconnected();
                return Err(e);
            }
        };

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("ws-recv".into())
            .spawn(move || shared.run(reader))
            .map_err(|e| {
                log::error!("[ws] cannot spawn receive thread: {e}");
                self.shared.teardown(ChannelState::Closed);
                Error::ConnectionError
            })?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    pub fn send_text(&self, text: &str) -> Result<(), Error> {
        self.shared.send_frame(Opcode::Text, text.as_bytes())?;
        self.shared.events.on_send(text);
        Ok(())
    }

    pub fn send_binary(&self, data: &[u8]) -> Result<(), Error> {
        self.shared.send_frame(Opcode::Binary, data)?;
        self.shared.events.on_send(&hex_dump(data));
        Ok(())
    }

    /// Sends `value` as a MessagePack binary message.
    pub fn send_structured(&self, value: &Value) -> Result<(), Error> {
        let bytes = rmp_serde::to_vec(value).map_err(|e| {
            log::warn!("[ws] cannot encode message: {e}");
            Error::ApplicationError
        })?;
        self.shared.send_frame(Opcode::Binary, &bytes)?;
        self.shared.events.on_send(&value.to_string());
        Ok(())
    }

    /// Says `"bye"`, disables keep-alive, shuts the transport down and waits
    /// for the receive thread.
    ///
    /// A reconnect still in flight is abandoned rather than published.
    pub fn close(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        self.shared.keep_alive.store(false, Ordering::SeqCst);
        self.shared.set_state(ChannelState::Closing);
        if self.is_connected() {
            if let Err(e) = self.shared.send_frame(Opcode::Text, BYE_TEXT.as_bytes()) {
                log::debug!("[ws] goodbye not sent: {e}");
            }
        }
        self.shared.teardown(ChannelState::Closed);
        self.join_worker();
    }

    fn join_worker(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("[ws] receive thread panicked");
        }
    }
}

impl<T: Connect + 'static> Drop for WebSocketChannel<T> {
    fn drop(&mut self) {
        if self.is_connected() || self.worker.lock().is_some() {
            self.close();
        }
    }
}
