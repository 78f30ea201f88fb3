use super::{DEFAULT_ITERATIONS, EnvelopeConfig, Error, IV_LEN, SALT_LEN, derive_key};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64ct::{Base64, Encoding};
use rand::RngCore;
use serde::{Deserialize, Serialize};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_LEN: usize = 16;

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

/// The decoded form of an envelope.
///
/// Field order matches the wire JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 of the AES-256-CBC ciphertext.
    pub ciphertext: String,
    /// Hex of the 16-byte IV.
    pub iv: String,
    /// Hex of the PBKDF2 salt.
    pub salt: String,
    /// PBKDF2 iteration count. Missing in the JSON means 999.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl EncryptedEnvelope {
    /// Serializes to JSON and wraps the JSON in base64.
    pub fn encode(&self) -> Result<String, Error> {
        let json = serde_json::to_vec(self).map_err(|_| Error::Encoding)?;
        Ok(Base64::encode_string(&json))
    }

    /// Reverses [`encode`](Self::encode).
    pub fn decode(encoded: &str) -> Result<Self, Error> {
        let json = Base64::decode_vec(encoded.trim()).map_err(|_| Error::Encoding)?;
        serde_json::from_slice(&json).map_err(|_| Error::Encoding)
    }
}

/// Seals and opens [`EncryptedEnvelope`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    config: EnvelopeConfig,
}

impl Envelope {
    /// Creates an envelope codec with the given settings.
    pub fn new(config: EnvelopeConfig) -> Self {
        Self { config }
    }

    /// The settings in use.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Encrypts `plaintext` and returns the base64 envelope string.
    ///
    /// A fresh random IV and salt are drawn on every call, so sealing the same
    /// plaintext twice yields unrelated outputs.
    pub fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String, Error> {
        self.seal(plaintext.as_bytes(), passphrase)?.encode()
    }

    /// Decrypts a base64 envelope string back to its UTF-8 plaintext.
    pub fn decrypt(&self, encoded: &str, passphrase: &str) -> Result<String, Error> {
        let envelope = EncryptedEnvelope::decode(encoded).inspect_err(|_| {
            log::warn!("[crypto] envelope decode failed");
        })?;
        let plain = self.open(&envelope, passphrase)?;
        String::from_utf8(plain).map_err(|_| Error::Padding)
    }

    /// Encrypts raw bytes into an envelope.
    pub fn seal(&self, plaintext: &[u8], passphrase: &str) -> Result<EncryptedEnvelope, Error> {
        let mut iv = [0u8; IV_LEN];
        let mut salt = [0u8; SALT_LEN];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut iv);
        rng.fill_bytes(&mut salt);

        let key = derive_key(
            passphrase.as_bytes(),
            &salt,
            self.config.iterations,
            self.config.digest,
        )?;
        let ciphertext =
            Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ok(EncryptedEnvelope {
            ciphertext: Base64::encode_string(&ciphertext),
            iv: hex::encode(iv),
            salt: hex::encode(salt),
            iterations: self.config.iterations,
        })
    }

    /// Decrypts an envelope into raw bytes.
    pub fn open(&self, envelope: &EncryptedEnvelope, passphrase: &str) -> Result<Vec<u8>, Error> {
        let iv = hex::decode(&envelope.iv).map_err(|_| Error::Encoding)?;
        let iv = <[u8; IV_LEN]>::try_from(iv.as_slice()).map_err(|_| Error::Envelope)?;
        let salt = hex::decode(&envelope.salt).map_err(|_| Error::Encoding)?;
        let ciphertext = Base64::decode_vec(&envelope.ciphertext).map_err(|_| Error::Encoding)?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(Error::Envelope);
        }

        let key = derive_key(
            passphrase.as_bytes(),
            &salt,
            envelope.iterations,
            self.config.digest,
        )?;
        Aes256CbcDec::new(&key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| {
                log::warn!("[crypto] invalid padding after decrypt");
                Error::Padding
            })
    }
}
