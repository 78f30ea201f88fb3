use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;

/// Receives channel events.
///
/// Every method has an empty default, so implementors override only what
/// they need. Methods are called from the receive thread (incoming messages,
/// redirects, peer close) or from the thread that called into the channel
/// (`start`, sends, `close`), and must not block for long.
pub trait WsEvents: Send + Sync {
    /// The upgrade handshake succeeded.
    fn on_connected(&self) {}

    /// The connection went away, or could not be established.
    fn on_disconnected(&self) {}

    /// A text message arrived.
    fn on_text(&self, _text: &str) {}

    /// A binary message arrived. Fired before any structured decoding.
    fn on_binary(&self, _data: &[u8]) {}

    /// A binary message decoded as MessagePack into a structured value.
    fn on_structured(&self, _value: &Value) {}

    /// A message was sent. Text is reported verbatim, binary as space
    /// separated hex and structured values as JSON.
    fn on_send(&self, _description: &str) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl WsEvents for NoEvents {}

/// One channel event, as delivered by [`ChannelEvents`].
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    Connected,
    Disconnected,
    Text(String),
    Binary(Vec<u8>),
    Structured(Value),
    Sent(String),
}

/// Forwards every event into a queue, preserving order.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    tx: Sender<WsEvent>,
}

impl ChannelEvents {
    /// An unbounded queue and the sink feeding it.
    pub fn unbounded() -> (Self, Receiver<WsEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    fn push(&self, event: WsEvent) {
        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }
}

impl WsEvents for ChannelEvents {
    fn on_connected(&self) {
        self.push(WsEvent::Connected);
    }

    fn on_disconnected(&self) {
        self.push(WsEvent::Disconnected);
    }

    fn on_text(&self, text: &str) {
        self.push(WsEvent::Text(text.to_owned()));
    }

    fn on_binary(&self, data: &[u8]) {
        self.push(WsEvent::Binary(data.to_vec()));
    }

    fn on_structured(&self, value: &Value) {
        self.push(WsEvent::Structured(value.clone()));
    }

    fn on_send(&self, description: &str) {
        self.push(WsEvent::Sent(description.to_owned()));
    }
}

/// Space separated lowercase hex, as reported by `on_send` for binary data.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
