//! Key encodings: raw binary and armored Base64 text
//!
//! ASCII key file layout:
//! ```text
//! -----BEGIN NALENC KEY-----
//! <standard Base64 of the 512 key bytes, wrapped at 64 columns>
//! -----END NALENC KEY-----
//! ```
//!
//! Decoding also accepts bare Base64 without the armor lines. Whitespace is
//! ignored everywhere in the body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use crate::error::{KeyError, KeyResult};
use crate::key::Key;
use crate::KEY_LEN;

pub const ARMOR_HEADER: &str = "-----BEGIN NALENC KEY-----";
pub const ARMOR_FOOTER: &str = "-----END NALENC KEY-----";

/// Base64 characters per body line
const LINE_WIDTH: usize = 64;

/// Binary encoding is the key bytes themselves.
pub fn encode_binary(key: &Key) -> &[u8; KEY_LEN] {
    key.as_bytes()
}

/// Armored Base64 encoding, newline-terminated.
pub fn encode_ascii(key: &Key) -> Zeroizing<String> {
    let b64 = Zeroizing::new(STANDARD.encode(key.as_bytes()));

    let mut out = Zeroizing::new(String::with_capacity(
        b64.len() + b64.len() / LINE_WIDTH + ARMOR_HEADER.len() + ARMOR_FOOTER.len() + 4,
    ));
    out.push_str(ARMOR_HEADER);
    out.push('\n');
    // Base64 output is pure ASCII, so byte chunks are char boundaries
    for line in b64.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(ARMOR_FOOTER);
    out.push('\n');
    out
}

pub fn decode_binary(bytes: &[u8]) -> KeyResult<Key> {
    Key::from_slice(bytes)
}

/// Decode armored or bare Base64 text.
///
/// Base64 failures are `DecodeError`; a successful decode of the wrong size
/// is `InvalidKeyLength`.
pub fn decode_ascii(text: &str) -> KeyResult<Key> {
    let body = strip_armor(text)?;
    let compact: Zeroizing<String> = Zeroizing::new(
        body.chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect(),
    );

    let decoded = STANDARD
        .decode(compact.as_bytes())
        .map(Zeroizing::new)
        .map_err(|e| KeyError::DecodeError(format!("invalid Base64: {e}")))?;

    Key::from_slice(&decoded)
}

fn strip_armor(text: &str) -> KeyResult<&str> {
    let trimmed = text.trim();
    let has_header = trimmed.starts_with(ARMOR_HEADER);
    let has_footer = trimmed.ends_with(ARMOR_FOOTER);

    match (has_header, has_footer) {
        (false, false) => Ok(trimmed),
        (true, true) if trimmed.len() >= ARMOR_HEADER.len() + ARMOR_FOOTER.len() => {
            Ok(&trimmed[ARMOR_HEADER.len()..trimmed.len() - ARMOR_FOOTER.len()])
        }
        _ => Err(KeyError::DecodeError(
            "key armor header and footer do not match".into(),
        )),
    }
}
