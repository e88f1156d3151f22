//! Typed errors for key handling and the cipher engine
//!
//! The front-end shows `kind()` and the `Display` message as-is, so messages
//! carry the values a user needs (observed length, path) and are not meant
//! to be reformatted.

use std::path::PathBuf;
use thiserror::Error;

use nalenc_core::KEY_LEN;

pub type KeyResult<T> = Result<T, KeyError>;
pub type CipherResult<T> = Result<T, CipherError>;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read key file: {0}")]
    ReadError(#[source] std::io::Error),

    #[error("could not read key file properties: {0}")]
    PropertyReadError(#[source] std::io::Error),

    #[error("invalid key file format: expected {} bytes binary or valid ASCII format", KEY_LEN)]
    InvalidFormat,

    #[error("invalid key length: {observed} bytes, expected {expected}")]
    InvalidKeyLength { observed: usize, expected: usize },

    #[error("could not decode ASCII key: {0}")]
    DecodeError(String),

    #[error("entropy source failure: {0}")]
    EntropySourceFailure(String),

    #[error("failed to save key to {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KeyError {
    pub(crate) fn wrong_length(observed: usize) -> Self {
        KeyError::InvalidKeyLength {
            observed,
            expected: KEY_LEN,
        }
    }

    /// Stable identifier of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            KeyError::NotFound { .. } => "NotFound",
            KeyError::ReadError(_) => "ReadError",
            KeyError::PropertyReadError(_) => "PropertyReadError",
            KeyError::InvalidFormat => "InvalidFormat",
            KeyError::InvalidKeyLength { .. } => "InvalidKeyLength",
            KeyError::DecodeError(_) => "DecodeError",
            KeyError::EntropySourceFailure(_) => "EntropySourceFailure",
            KeyError::WriteError { .. } => "WriteError",
        }
    }
}

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("not a NALEnc container: {0}")]
    MalformedContainer(String),

    #[error("authentication failed: wrong key or corrupted container")]
    AuthenticationError,

    #[error("I/O failure while {context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid chunk size {size}: must be between {min} and {max} bytes")]
    InvalidChunkSize { size: u32, min: u32, max: u32 },

    #[error("cryptographic primitive failed: {0}")]
    CryptoFailure(String),
}

impl CipherError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CipherError::IoFailure {
            context: context.into(),
            source,
        }
    }

    /// Stable identifier of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            CipherError::MalformedContainer(_) => "MalformedContainer",
            CipherError::AuthenticationError => "AuthenticationError",
            CipherError::IoFailure { .. } => "IOFailure",
            CipherError::Cancelled => "Cancelled",
            CipherError::InvalidChunkSize { .. } => "InvalidChunkSize",
            CipherError::CryptoFailure(_) => "CryptoFailure",
        }
    }
}

/// Error returned by the boundary operations in the crate root
#[derive(Debug, Error)]
pub enum NalencError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl NalencError {
    pub fn kind(&self) -> &'static str {
        match self {
            NalencError::Key(e) => e.kind(),
            NalencError::Cipher(e) => e.kind(),
        }
    }
}
