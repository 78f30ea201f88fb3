#![deny(unsafe_code)]

//! # Over-the-Air (OTA) Updates
//!
//! Downloads a firmware image over [`HttpEngine`] and hands it to a
//! [`Platform`] in fixed-size chunks. The updater walks through a small state
//! machine:
//!
//! * `Idle`: nothing started yet.
//! * `Downloading`: fetching the image.
//! * `Verifying`: checking the CRC-32 of the whole image, if one was given.
//! * `Writing`: passing chunks to the platform.
//! * `Done` / `Failed`: terminal for this attempt; `begin` may be called again.
//!
//! Progress is reported through [`OtaEvents`]. A response shorter than its
//! `Content-Length` is never written.

use crate::network::Connect;
use crate::network::application::http::HttpEngine;
use base64ct::{Base64, Encoding as B64Encoding};
use std::borrow::Cow;
use std::sync::Arc;

/// Size of the chunks handed to [`Platform::save_firmware_chunk`].
pub const CHUNK_SIZE: usize = 1024;

/// Updater state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Downloading,
    Verifying,
    Writing,
    Done,
    Failed,
}

/// Why an update attempt failed. The `Display` text is what
/// [`OtaEvents::on_fail`] receives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("download failed: {0}")]
    DownloadError(crate::network::error::Error),
    #[error("unexpected status {0}")]
    BadStatus(i32),
    #[error("incomplete image: got {received} of {expected} bytes")]
    IncompleteData { expected: usize, received: usize },
    #[error("image is not valid base64")]
    DecodeError,
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    VerificationError { expected: u32, actual: u32 },
    #[error("writing the image failed")]
    WriteError,
    #[error("activating the image failed")]
    ActivationError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::DownloadError(_) => defmt::write!(f, "DownloadError"),
            Error::BadStatus(code) => defmt::write!(f, "BadStatus({})", code),
            Error::IncompleteData { .. } => defmt::write!(f, "IncompleteData"),
            Error::DecodeError => defmt::write!(f, "DecodeError"),
            Error::VerificationError { .. } => defmt::write!(f, "VerificationError"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ActivationError => defmt::write!(f, "ActivationError"),
        }
    }
}

/// How the image is encoded on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Raw,
    Base64,
}

/// What is known about the image before downloading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Firmware {
    pub encoding: Encoding,
    /// CRC-32 of the decoded image.
    pub checksum: Option<u32>,
}

/// Progress hooks. All default to doing nothing.
pub trait OtaEvents: Send + Sync {
    /// About to contact the server.
    fn on_connected(&self) {}
    /// A chunk was written.
    fn on_writing(&self) {}
    /// The image was written and activated.
    fn on_success(&self) {}
    fn on_fail(&self, _message: &str) {}
}

impl OtaEvents for crate::network::application::websocket::NoEvents {}

/// Where the image goes.
pub trait Platform {
    /// Persists the next chunk of the image.
    fn save_firmware_chunk(&mut self, chunk: &[u8]) -> Result<(), Error>;

    /// Marks the written image bootable.
    fn activate_firmware(&mut self) -> Result<(), Error>;

    /// Discards a partially written image.
    fn abort(&mut self) {}
}

pub struct OtaUpdater<T: Connect, P: Platform> {
    engine: HttpEngine<T>,
    platform: P,
    events: Arc<dyn OtaEvents>,
    firmware: Firmware,
    state: State,
}

impl<T: Connect, P: Platform + core::fmt::Debug> core::fmt::Debug for OtaUpdater<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OtaUpdater")
            .field("platform", &self.platform)
            .field("firmware", &self.firmware)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Connect, P: Platform> OtaUpdater<T, P> {
    pub fn new(engine: HttpEngine<T>, platform: P, events: Arc<dyn OtaEvents>) -> Self {
        Self {
            engine,
            platform,
            events,
            firmware: Firmware::default(),
            state: State::Idle,
        }
    }

    /// Describes the next image to fetch.
    pub fn set_firmware(&mut self, firmware: Firmware) {
        self.firmware = firmware;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Downloads, writes and activates the image at `url`.
    ///
    /// Returns `true` after `on_success`; on any failure `on_fail` has been
    /// called with the reason and `false` is returned.
    pub fn begin(&mut self, url: &str) -> bool {
        match self.run(url) {
            Ok(()) => {
                self.state = State::Done;
                log::info!("[ota] update from {url} installed");
                self.events.on_success();
                true
            }
            Err(e) => {
                self.state = State::Failed;
                log::error!("[ota] update from {url} failed: {e}");
                self.events.on_fail(&e.to_string());
                false
            }
        }
    }

    fn run(&mut self, url: &str) -> Result<(), Error> {
        self.state = State::Downloading;
        self.events.on_connected();

        self.engine.open(url).map_err(Error::DownloadError)?;
        let fetched = self.engine.get();
        self.engine.close();
        let status = fetched.map_err(Error::DownloadError)?;
        if status != 200 {
            return Err(Error::BadStatus(i32::from(status)));
        }

        let body = self.engine.response_body();
        let declared = self
            .engine
            .response_header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok());
        if let Some(expected) = declared {
            if body.len() < expected {
                return Err(Error::IncompleteData { expected, received: body.len() });
            }
        }

        let image: Cow<'_, [u8]> = match self.firmware.encoding {
            Encoding::Raw => Cow::Borrowed(body),
            Encoding::Base64 => {
                let text = core::str::from_utf8(body).map_err(|_| Error::DecodeError)?;
                let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                Cow::Owned(Base64::decode_vec(&cleaned).map_err(|_| Error::DecodeError)?)
            }
        };

        self.state = State::Verifying;
        if let Some(expected) = self.firmware.checksum {
            let actual = crc32fast::hash(&image);
            if actual != expected {
                return Err(Error::VerificationError { expected, actual });
            }
        }

        self.state = State::Writing;
        for chunk in image.chunks(CHUNK_SIZE) {
            if let Err(e) = self.platform.save_firmware_chunk(chunk) {
                self.platform.abort();
                return Err(e);
            }
            self.events.on_writing();
        }
        log::debug!("[ota] wrote {} bytes", image.len());

        self.platform.activate_firmware()
    }
}
