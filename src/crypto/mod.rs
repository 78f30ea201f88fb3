//! # Symmetric encryption envelope
//!
//! RPC payloads travel inside a self-describing envelope: the ciphertext plus
//! everything except the passphrase needed to decrypt it.
//!
//! ```text
//! base64( {"ciphertext": base64(AES-256-CBC(PKCS#7(plaintext))),
//!          "iv":         hex(16 random bytes),
//!          "salt":       hex(256 random bytes),
//!          "iterations": 999} )
//! ```
//!
//! The 32-byte AES key is derived from the passphrase and the salt with
//! PBKDF2-HMAC. SHA-512 is the digest used by the encrypting side; the digest
//! is configurable because one deployed decrypt path was observed deriving
//! with SHA-256 (see [`Digest`]).
//!
//! # Example
//!
//! ```rust
//! use carmeleon_client::crypto::Envelope;
//!
//! let envelope = Envelope::default();
//! let sealed = envelope.encrypt(r#"{"ok":true}"#, "passphrase").unwrap();
//! assert_eq!(envelope.decrypt(&sealed, "passphrase").unwrap(), r#"{"ok":true}"#);
//! assert!(envelope.decrypt(&sealed, "wrong").is_err());
//! ```

#![deny(unsafe_code)]

mod envelope;

pub use envelope::{EncryptedEnvelope, Envelope};

/// AES block size; also the IV length.
pub const IV_LEN: usize = 16;

/// Length of the random PBKDF2 salt.
pub const SALT_LEN: usize = 256;

/// Length of the derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count written into new envelopes.
pub const DEFAULT_ITERATIONS: u32 = 999;

/// Errors raised while sealing or opening an envelope.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum Error {
    /// PBKDF2 rejected its parameters (e.g. zero iterations).
    #[error("key derivation failed")]
    KeyDerivation,
    /// Base64, hex or JSON decoding of the envelope failed.
    #[error("malformed envelope encoding")]
    Encoding,
    /// The envelope decoded but is structurally invalid (bad IV length,
    /// ciphertext not block aligned).
    #[error("invalid envelope")]
    Envelope,
    /// The decrypted data does not end in valid PKCS#7 padding, or is not
    /// UTF-8. This is what a wrong passphrase usually produces.
    #[error("invalid padding")]
    Padding,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::KeyDerivation => defmt::write!(f, "KeyDerivation"),
            Error::Encoding => defmt::write!(f, "Encoding"),
            Error::Envelope => defmt::write!(f, "Envelope"),
            Error::Padding => defmt::write!(f, "Padding"),
        }
    }
}

/// Hash function used inside PBKDF2-HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Digest {
    /// HMAC-SHA-512, used by every encrypting peer.
    #[default]
    Sha512,
    /// HMAC-SHA-256, kept for peers whose decrypt path derives with SHA-256.
    Sha256,
}

/// Tunables for [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// PBKDF2 digest, applied to both directions.
    pub digest: Digest,
    /// Iteration count written into new envelopes. Decryption always uses the
    /// count recorded in the envelope.
    pub iterations: u32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            digest: Digest::Sha512,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derives a 32-byte key with PBKDF2-HMAC.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
    digest: Digest,
) -> Result<[u8; KEY_LEN], Error> {
    use hmac::Hmac;
    use sha2::{Sha256, Sha512};

    if iterations == 0 {
        return Err(Error::KeyDerivation);
    }
    let mut key = [0u8; KEY_LEN];
    match digest {
        Digest::Sha512 => pbkdf2::pbkdf2::<Hmac<Sha512>>(passphrase, salt, iterations, &mut key)
            .map_err(|_| Error::KeyDerivation)?,
        Digest::Sha256 => pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase, salt, iterations, &mut key)
            .map_err(|_| Error::KeyDerivation)?,
    }
    Ok(key)
}
