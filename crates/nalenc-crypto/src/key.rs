//! The 512-byte NALEnc key and its generator

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{KeyError, KeyResult};
use crate::KEY_LEN;

/// Number of hex characters in a key fingerprint
const FINGERPRINT_HEX_LEN: usize = 16;

/// A 512-byte symmetric key. Zeroized on drop.
///
/// The length is part of the type: there is no way to build a `Key` from
/// anything other than exactly `KEY_LEN` bytes.
pub struct Key {
    bytes: Box<[u8; KEY_LEN]>,
}

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Box::new(bytes),
        }
    }

    /// Build a key from a slice, rejecting anything that is not exactly `KEY_LEN` bytes.
    pub fn from_slice(bytes: &[u8]) -> KeyResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::wrong_length(bytes.len()));
        }
        let mut boxed = Box::new([0u8; KEY_LEN]);
        boxed.copy_from_slice(bytes);
        Ok(Self { bytes: boxed })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short public identifier for display: leading hex of BLAKE3(key).
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.bytes.as_slice());
        hash.to_hex().as_str()[..FINGERPRINT_HEX_LEN].to_string()
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a new key from the operating system CSPRNG.
///
/// An entropy-source fault is returned as `EntropySourceFailure` and never retried.
pub fn generate_key() -> KeyResult<Key> {
    let mut bytes = Box::new([0u8; KEY_LEN]);
    OsRng
        .try_fill_bytes(bytes.as_mut_slice())
        .map_err(|e| KeyError::EntropySourceFailure(e.to_string()))?;
    tracing::debug!("generated new key");
    Ok(Key { bytes })
}
