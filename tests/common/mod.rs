//! Scripted in-memory transport shared by the integration tests.
//!
//! Every `connect` takes the next [`Script`] off a queue. The server side of a
//! connection is a [`Peer`]: tests push bytes into it, close it, and inspect
//! what the client wrote.

#![allow(dead_code)]

use carmeleon_client::cookies::CookieJar;
use carmeleon_client::network::error::Error;
use carmeleon_client::network::{Close, Connect, Connection, Read, Shutdown, Write};
use carmeleon_client::storage::MemoryStore;
use carmeleon_client::system::clock::ManualClock;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const NOW: i64 = 1_700_000_000;

/// What the server does on one connection.
#[derive(Debug, Clone)]
pub enum Script {
    /// Sends `bytes`, then closes its side.
    Reply(Vec<u8>),
    /// Sends `bytes` and keeps the connection open for pushed data.
    Hold(Vec<u8>),
    /// The connection attempt fails.
    Refuse,
    /// `connect` blocks until the gate opens, then follows the inner script.
    Gated(Gate, Box<Script>),
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Script::Reply(text.as_bytes().to_vec())
    }

    pub fn upgrade() -> Self {
        Script::Hold(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n".to_vec())
    }
}

#[derive(Debug, Default)]
struct GateState {
    entered: bool,
    open: bool,
}

/// Holds a connection attempt until the test lets it through.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    state: Arc<(Mutex<GateState>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a connection attempt is waiting (or has waited) here.
    pub fn is_entered(&self) -> bool {
        self.state.0.lock().entered
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.state;
        lock.lock().open = true;
        cvar.notify_all();
    }

    fn pass(&self) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        state.entered = true;
        while !state.open {
            cvar.wait(&mut state);
        }
    }
}

#[derive(Debug, Default)]
struct PeerState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    server_closed: bool,
    shutdown: bool,
}

/// Server side of one connection.
#[derive(Debug, Clone, Default)]
pub struct Peer {
    state: Arc<(Mutex<PeerState>, Condvar)>,
}

impl Peer {
    pub fn push(&self, bytes: &[u8]) {
        let (lock, cvar) = &*self.state;
        lock.lock().incoming.extend(bytes);
        cvar.notify_all();
    }

    /// Closes the server side; the client reads end of stream.
    pub fn close(&self) {
        let (lock, cvar) = &*self.state;
        lock.lock().server_closed = true;
        cvar.notify_all();
    }

    /// Everything the client wrote so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.0.lock().written.clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    /// The request head the client sent, up to the blank line.
    pub fn request_head(&self) -> String {
        let text = self.written_text();
        match text.find("\r\n\r\n") {
            Some(end) => text[..end].to_owned(),
            None => text,
        }
    }

    /// Bytes written after the request head.
    pub fn after_head(&self) -> Vec<u8> {
        let written = self.written();
        match written.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => written[end + 4..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.0.lock().shutdown
    }
}

/// Client side handed to the engine.
#[derive(Debug)]
pub struct ScriptedConnection {
    peer: Peer,
}

impl Read for ScriptedConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let (lock, cvar) = &*self.peer.state;
        let mut state = lock.lock();
        loop {
            if state.shutdown {
                return Ok(0);
            }
            if !state.incoming.is_empty() {
                let n = buf.len().min(state.incoming.len());
                for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.server_closed {
                return Ok(0);
            }
            cvar.wait(&mut state);
        }
    }
}

fn write_to(peer: &Peer, buf: &[u8]) -> Result<usize, Error> {
    let mut state = peer.state.0.lock();
    if state.shutdown {
        return Err(Error::ConnectionClosed);
    }
    state.written.extend_from_slice(buf);
    Ok(buf.len())
}

fn shut(peer: &Peer) {
    let (lock, cvar) = &*peer.state;
    lock.lock().shutdown = true;
    cvar.notify_all();
}

impl Write for ScriptedConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        write_to(&self.peer, buf)
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl Close for ScriptedConnection {
    type Error = Error;

    fn close(self) -> Result<(), Error> {
        shut(&self.peer);
        Ok(())
    }
}

#[derive(Debug)]
pub struct ScriptedWriter {
    peer: Peer,
}

impl Write for ScriptedWriter {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        write_to(&self.peer, buf)
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl Shutdown for ScriptedWriter {
    fn shutdown(&self) {
        shut(&self.peer);
    }
}

impl Connection for ScriptedConnection {
    type Writer = ScriptedWriter;

    fn writer(&self) -> Result<ScriptedWriter, Error> {
        Ok(ScriptedWriter { peer: self.peer.clone() })
    }
}

#[derive(Debug, Default)]
struct Inner {
    scripts: VecDeque<Script>,
    attempts: Vec<(String, u16, bool)>,
    peers: Vec<Peer>,
}

/// A transport whose server behavior is scripted per connection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, script: Script) -> &Self {
        self.inner.lock().scripts.push_back(script);
        self
    }

    /// `(host, port, secure)` of every connection attempt, refused ones too.
    pub fn attempts(&self) -> Vec<(String, u16, bool)> {
        self.inner.lock().attempts.clone()
    }

    pub fn peer(&self, index: usize) -> Peer {
        self.inner.lock().peers[index].clone()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.lock().peers.len()
    }
}

impl Connect for ScriptedTransport {
    type Connection = ScriptedConnection;

    fn connect(&self, host: &str, port: u16, secure: bool) -> Result<ScriptedConnection, Error> {
        let script = {
            let mut inner = self.inner.lock();
            inner.attempts.push((host.to_owned(), port, secure));
            inner.scripts.pop_front()
        };
        let script = match script {
            Some(Script::Gated(gate, next)) => {
                gate.pass();
                Some(*next)
            }
            other => other,
        };
        let (bytes, hold) = match script {
            Some(Script::Reply(bytes)) => (bytes, false),
            Some(Script::Hold(bytes)) => (bytes, true),
            Some(Script::Refuse | Script::Gated(..)) | None => return Err(Error::ConnectionError),
        };
        let peer = Peer::default();
        peer.push(&bytes);
        if !hold {
            peer.close();
        }
        self.inner.lock().peers.push(peer.clone());
        Ok(ScriptedConnection { peer })
    }
}

/// A jar over an in-memory store with a synchronized manual clock.
pub fn jar() -> (Arc<CookieJar>, ManualClock) {
    let clock = ManualClock::new(NOW);
    let jar = CookieJar::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
    (Arc::new(jar), clock)
}

/// Polls `check` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}
