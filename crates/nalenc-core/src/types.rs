use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Length of a NALEnc key in bytes. Every key, on disk or in memory, is exactly this long.
pub const KEY_LEN: usize = 512;

/// Conventional extension of encrypted containers
pub const CONTAINER_EXTENSION: &str = "nalenc";

/// Conventional extension of key files
pub const KEY_EXTENSION: &str = "key";

/// On-disk encoding of a key file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Exactly `KEY_LEN` raw bytes
    #[default]
    Binary,
    /// Armored Base64 text
    Ascii,
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Binary => f.write_str("binary"),
            KeyFormat::Ascii => f.write_str("ascii"),
        }
    }
}

/// Which way a cipher operation transforms a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("encrypt"),
            Direction::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Suggest an output path next to `input` when the caller did not pick one.
///
/// - encrypt: `report.pdf` → `report.pdf.nalenc`
/// - decrypt: `report.pdf.nalenc` → `report.pdf`
/// - decrypt of anything else: `blob.bin` → `blob_decrypted.bin`
pub fn suggest_output_path(input: &Path, direction: Direction) -> PathBuf {
    match direction {
        Direction::Encrypt => append_extension(input, CONTAINER_EXTENSION),
        Direction::Decrypt => {
            let is_container = input
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION));
            if is_container {
                return input.with_extension("");
            }

            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            let name = match input.extension() {
                Some(ext) => format!("{stem}_decrypted.{}", ext.to_string_lossy()),
                None => format!("{stem}_decrypted"),
            };
            input.with_file_name(name)
        }
    }
}

/// Append `.key` unless the path already ends with it (case-insensitive).
pub fn ensure_key_extension(path: &Path) -> PathBuf {
    let has_key_ext = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(KEY_EXTENSION));
    if has_key_ext {
        path.to_path_buf()
    } else {
        append_extension(path, KEY_EXTENSION)
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
