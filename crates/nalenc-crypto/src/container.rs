//! `.nalenc` container layout
//!
//! ```text
//! offset  size  field
//! 0       6     magic "NALENC"
//! 6       1     version (1)
//! 7       1     flags (reserved, 0)
//! 8       4     chunk size, u32 BE (plaintext bytes per chunk)
//! 12      24    nonce (random per container)
//! 36      16    header tag (Poly1305 over empty message, AAD = bytes 0..36)
//! 52      ...   chunks: [ciphertext (<= chunk size)][16-byte tag]
//! ```
//!
//! Every chunk except the last carries exactly `chunk size` plaintext bytes.
//! The last chunk may be shorter or empty, and is marked final in its AAD,
//! so dropping or appending chunks fails authentication.
//!
//! Chunk AAD = counter (8 bytes, big-endian) || final flag (1 byte)

use std::io::{self, Read};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CipherError, CipherResult};

pub const MAGIC: [u8; 6] = *b"NALENC";
pub const VERSION: u8 = 1;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Authenticated header fields preceding the header tag
pub const PREAMBLE_LEN: usize = 36;

/// Full header length including its tag
pub const HEADER_LEN: usize = PREAMBLE_LEN + TAG_SIZE;

pub const MIN_CHUNK_SIZE: u32 = 1024;
pub const MAX_CHUNK_SIZE: u32 = 16 * 1024 * 1024;

/// Counter reserved for the header tag; chunk counters never reach it.
pub(crate) const HEADER_TAG_COUNTER: u64 = u64::MAX;

/// Parsed container header (without its tag)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub chunk_size: u32,
    pub nonce: [u8; NONCE_SIZE],
}

impl Header {
    /// Header for a new container with a fresh nonce from the OS CSPRNG.
    pub fn generate(chunk_size: u32) -> CipherResult<Self> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CipherError::CryptoFailure(format!("entropy source failure: {e}")))?;
        Ok(Self { chunk_size, nonce })
    }

    /// Serialize the authenticated preamble (everything before the header tag)
    pub fn to_bytes(&self) -> [u8; PREAMBLE_LEN] {
        let mut out = [0u8; PREAMBLE_LEN];
        out[0..6].copy_from_slice(&MAGIC);
        out[6] = VERSION;
        out[7] = 0;
        out[8..12].copy_from_slice(&self.chunk_size.to_be_bytes());
        out[12..].copy_from_slice(&self.nonce);
        out
    }

    /// Parse and validate a preamble.
    ///
    /// Anything that does not look like a NALEnc container is
    /// `MalformedContainer`, never `AuthenticationError`.
    pub fn parse(bytes: &[u8; PREAMBLE_LEN]) -> CipherResult<Self> {
        if bytes[0..6] != MAGIC {
            return Err(CipherError::MalformedContainer("bad magic".into()));
        }
        if bytes[6] != VERSION {
            return Err(CipherError::MalformedContainer(format!(
                "unsupported container version {}",
                bytes[6]
            )));
        }
        if bytes[7] != 0 {
            return Err(CipherError::MalformedContainer(format!(
                "unknown header flags {:#04x}",
                bytes[7]
            )));
        }

        let mut size = [0u8; 4];
        size.copy_from_slice(&bytes[8..12]);
        let chunk_size = u32::from_be_bytes(size);
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(CipherError::MalformedContainer(format!(
                "chunk size {chunk_size} out of range"
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[12..]);
        Ok(Self { chunk_size, nonce })
    }

    /// Read the header and its tag from the start of a container stream.
    pub fn read_from<R: Read>(reader: &mut R) -> CipherResult<(Self, [u8; TAG_SIZE])> {
        let mut buf = [0u8; HEADER_LEN];
        let n = read_full(reader, &mut buf)
            .map_err(|e| CipherError::io("reading container header", e))?;
        if n < HEADER_LEN {
            return Err(CipherError::MalformedContainer(format!(
                "truncated header: {n} of {HEADER_LEN} bytes"
            )));
        }

        let mut preamble = [0u8; PREAMBLE_LEN];
        preamble.copy_from_slice(&buf[..PREAMBLE_LEN]);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&buf[PREAMBLE_LEN..]);

        Ok((Self::parse(&preamble)?, tag))
    }

    /// Encrypted size of a full chunk
    pub fn sealed_chunk_len(&self) -> usize {
        self.chunk_size as usize + TAG_SIZE
    }

    /// Per-chunk nonce: container nonce with the big-endian counter XORed into its tail.
    pub(crate) fn chunk_nonce(&self, counter: u64) -> [u8; NONCE_SIZE] {
        let mut nonce = self.nonce;
        for (b, c) in nonce[NONCE_SIZE - 8..].iter_mut().zip(counter.to_be_bytes()) {
            *b ^= c;
        }
        nonce
    }
}

pub fn validate_chunk_size(size: u32) -> CipherResult<()> {
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(CipherError::InvalidChunkSize {
            size,
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        })
    }
}

/// Build chunk AAD: counter (8 bytes BE) || final flag
pub(crate) fn chunk_aad(counter: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&counter.to_be_bytes());
    aad[8] = u8::from(last);
    aad
}

/// Fill `buf` from `reader`, stopping early only at EOF. Returns bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = Header::generate(64 * 1024).unwrap();
        let parsed = Header::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_layout() {
        let header = Header {
            chunk_size: 0x0001_0000,
            nonce: [0xEE; NONCE_SIZE],
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..6], b"NALENC");
        assert_eq!(bytes[6], VERSION);
        assert_eq!(bytes[7], 0);
        assert_eq!(&bytes[8..12], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&bytes[12..], &[0xEE; NONCE_SIZE]);
    }

    #[test]
    fn test_fresh_headers_have_distinct_nonces() {
        let a = Header::generate(MIN_CHUNK_SIZE).unwrap();
        let b = Header::generate(MIN_CHUNK_SIZE).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_generated_header_parses_back() {
        let header = Header::generate(MAX_CHUNK_SIZE).unwrap();
        assert_ne!(header.nonce, [0u8; NONCE_SIZE]);
        assert_eq!(Header::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = Header::generate(MIN_CHUNK_SIZE).unwrap().to_bytes();
        bytes[0] = b'X';
        let err = Header::parse(&bytes).unwrap_err();
        assert!(matches!(err, CipherError::MalformedContainer(_)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = Header::generate(MIN_CHUNK_SIZE).unwrap().to_bytes();
        bytes[6] = 9;
        let err = Header::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 9"), "{err}");
    }

    #[test]
    fn test_out_of_range_chunk_size_rejected() {
        let mut bytes = Header::generate(MIN_CHUNK_SIZE).unwrap().to_bytes();
        bytes[8..12].copy_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            Header::parse(&bytes),
            Err(CipherError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = Header::generate(MIN_CHUNK_SIZE).unwrap().to_bytes();
        let err = Header::read_from(&mut &bytes[..20]).unwrap_err();
        assert!(matches!(err, CipherError::MalformedContainer(_)));
    }

    #[test]
    fn test_chunk_nonces_are_distinct() {
        let header = Header::generate(MIN_CHUNK_SIZE).unwrap();
        let n0 = header.chunk_nonce(0);
        let n1 = header.chunk_nonce(1);
        let nh = header.chunk_nonce(HEADER_TAG_COUNTER);
        assert_eq!(n0, header.nonce);
        assert_ne!(n0, n1);
        assert_ne!(n1, nh);
        assert_eq!(n0[..16], n1[..16]);
    }

    #[test]
    fn test_chunk_aad_marks_final() {
        assert_eq!(chunk_aad(1, false), [0, 0, 0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(chunk_aad(1, true), [0, 0, 0, 0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_validate_chunk_size_bounds() {
        assert!(validate_chunk_size(MIN_CHUNK_SIZE).is_ok());
        assert!(validate_chunk_size(MAX_CHUNK_SIZE).is_ok());
        assert!(matches!(
            validate_chunk_size(MIN_CHUNK_SIZE - 1),
            Err(CipherError::InvalidChunkSize { .. })
        ));
        assert!(validate_chunk_size(MAX_CHUNK_SIZE + 1).is_err());
    }

    #[test]
    fn test_read_full_stops_at_eof() {
        let data = [1u8; 10];
        let mut buf = [0u8; 16];
        let n = read_full(&mut &data[..], &mut buf).unwrap();
        assert_eq!(n, 10);
    }
}
