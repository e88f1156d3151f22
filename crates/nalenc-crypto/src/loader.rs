//! Key file loading and saving
//!
//! Loading is a two-stage probe:
//! 1. content of exactly `KEY_LEN` bytes is a binary key, returned as-is;
//! 2. anything else must be UTF-8 text holding Base64 of `KEY_LEN` bytes.
//!
//! Every path ends in either a valid key or one specific `KeyError`.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use zeroize::Zeroizing;

use crate::codec;
use crate::error::{KeyError, KeyResult};
use crate::key::Key;
use crate::{KeyFormat, KEY_LEN};

/// Largest file considered as a key candidate. Armored keys are under 1 KiB.
pub const MAX_KEY_FILE_LEN: u64 = 64 * 1024;

/// Load and validate a key file in either encoding.
pub fn load_key(path: &Path) -> KeyResult<Key> {
    probe_key(path).map(|(key, _)| key)
}

/// Load a key file and report which encoding it used.
pub fn probe_key(path: &Path) -> KeyResult<(Key, KeyFormat)> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(KeyError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(KeyError::PropertyReadError(e)),
    };

    if !metadata.is_file() {
        return Err(KeyError::PropertyReadError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    if metadata.len() > MAX_KEY_FILE_LEN {
        return Err(KeyError::InvalidFormat);
    }

    let content = read_capped(path)?;
    let (key, format) = decode_key_file(&content)?;

    tracing::debug!(path = %path.display(), %format, "loaded key");
    Ok((key, format))
}

/// Classify and decode raw key file content.
pub fn decode_key_file(content: &[u8]) -> KeyResult<(Key, KeyFormat)> {
    if content.len() == KEY_LEN {
        return Ok((codec::decode_binary(content)?, KeyFormat::Binary));
    }

    // Neither a binary key nor text: typically a truncated or padded binary key
    let text = std::str::from_utf8(content).map_err(|_| KeyError::InvalidFormat)?;

    match codec::decode_ascii(text) {
        Ok(key) => Ok((key, KeyFormat::Ascii)),
        Err(KeyError::DecodeError(_)) => Err(KeyError::InvalidFormat),
        Err(e) => Err(e),
    }
}

fn read_capped(path: &Path) -> KeyResult<Zeroizing<Vec<u8>>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => KeyError::NotFound {
            path: path.to_path_buf(),
        },
        _ => KeyError::ReadError(e),
    })?;

    // Sized up front so the buffer never reallocates and leaves copies behind
    let mut buf = Zeroizing::new(Vec::with_capacity(MAX_KEY_FILE_LEN as usize + 1));
    file.take(MAX_KEY_FILE_LEN + 1)
        .read_to_end(&mut buf)
        .map_err(KeyError::ReadError)?;

    // The file grew between stat and read
    if buf.len() as u64 > MAX_KEY_FILE_LEN {
        return Err(KeyError::InvalidFormat);
    }
    Ok(buf)
}

/// Write a key file in the chosen encoding, replacing any existing file.
///
/// The key is written to a temporary file next to `path` and renamed into
/// place, so a failed save never leaves a half-written key. `tempfile`
/// creates the file owner-only (0600) on Unix.
pub fn save_key(key: &Key, path: &Path, format: KeyFormat) -> KeyResult<()> {
    let write_err = |source: io::Error| KeyError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".nalenc-key-")
        .tempfile_in(dir)
        .map_err(write_err)?;

    match format {
        KeyFormat::Binary => tmp.write_all(codec::encode_binary(key)),
        KeyFormat::Ascii => tmp.write_all(codec::encode_ascii(key).as_bytes()),
    }
    .map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    tracing::debug!(path = %path.display(), %format, "saved key");
    Ok(())
}
