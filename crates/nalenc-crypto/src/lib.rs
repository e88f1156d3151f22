//! nalenc-crypto: key management and the `.nalenc` file cipher
//!
//! Architecture: 512-byte key → per-container file key → chunked AEAD
//!
//! ```text
//! Key (512 bytes, OS CSPRNG, binary or armored Base64 on disk)
//!   └── File Key (per container, HKDF-SHA256, salt = container nonce)
//!       └── Chunk AEAD: XChaCha20-Poly1305 (nonce = container nonce ^ counter, AAD = counter || final)
//! ```
//!
//! The functions at the crate root are the operations a front-end calls.
//! Each returns a typed `NalencError` whose `kind()` and message are meant to
//! be shown to the user unchanged.

pub mod cipher;
pub mod codec;
pub mod container;
pub mod error;
pub mod key;
pub mod loader;

use std::path::Path;

pub use cipher::{CancelToken, CipherEngine, CipherOptions, CipherSummary, ProgressFn, StreamControl};
pub use container::{Header, HEADER_LEN, NONCE_SIZE, TAG_SIZE};
pub use error::{CipherError, KeyError, NalencError};
pub use key::Key;
pub use loader::probe_key;
pub use nalenc_core::{KeyFormat, KEY_LEN};

pub type NalencResult<T> = Result<T, NalencError>;

/// Generate a new random 512-byte key.
pub fn generate_key() -> NalencResult<Key> {
    Ok(key::generate_key()?)
}

/// Persist `key` at `path` in the chosen encoding.
pub fn save_key(key: &Key, path: &Path, format: KeyFormat) -> NalencResult<()> {
    Ok(loader::save_key(key, path, format)?)
}

/// Load and validate a key file in either encoding.
pub fn load_key(path: &Path) -> NalencResult<Key> {
    Ok(loader::load_key(path)?)
}

/// Encrypt the file at `input` into a container at `output`.
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    key: &Key,
    options: CipherOptions,
    ctl: &StreamControl<'_>,
) -> NalencResult<CipherSummary> {
    let engine = CipherEngine::new(options)?;
    let summary = engine.encrypt_file(key, input, output, ctl)?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes = summary.bytes_in,
        "encrypted"
    );
    Ok(summary)
}

/// Decrypt the container at `input` into `output`.
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    key: &Key,
    ctl: &StreamControl<'_>,
) -> NalencResult<CipherSummary> {
    let summary = CipherEngine::default().decrypt_file(key, input, output, ctl)?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes = summary.bytes_out,
        "decrypted"
    );
    Ok(summary)
}
