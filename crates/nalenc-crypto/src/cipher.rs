//! Streaming container encryption/decryption
//!
//! Each container gets its own 256-bit file key:
//! ```text
//! file_key = HKDF-SHA256(ikm = 512-byte key, salt = container nonce, info = "nalenc v1 file key")
//! ```
//! and every chunk is sealed with XChaCha20-Poly1305 under that key. Memory
//! use is two chunk buffers regardless of input size.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::container::{
    chunk_aad, read_full, validate_chunk_size, Header, HEADER_LEN, HEADER_TAG_COUNTER, TAG_SIZE,
};
use crate::error::{CipherError, CipherResult};
use crate::key::Key;

/// Size of the derived per-container AEAD key (256-bit)
pub const FILE_KEY_SIZE: usize = 32;

const FILE_KEY_INFO: &[u8] = b"nalenc v1 file key";

/// Progress callback: (input bytes consumed, expected input bytes or 0 if unknown)
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Cooperative cancellation flag, checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Caller hooks for a single operation
#[derive(Clone, Copy, Default)]
pub struct StreamControl<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub progress: Option<&'a ProgressFn>,
    /// Expected input length for progress reporting (0 if unknown)
    pub total_bytes: u64,
}

impl StreamControl<'_> {
    fn check_cancelled(&self) -> CipherResult<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(CipherError::Cancelled),
            _ => Ok(()),
        }
    }

    fn report(&self, done: u64) {
        if let Some(progress) = self.progress {
            progress(done, self.total_bytes);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CipherOptions {
    /// Plaintext bytes per chunk for new containers
    pub chunk_size: u32,
}

impl Default for CipherOptions {
    fn default() -> Self {
        Self {
            chunk_size: nalenc_core::config::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Outcome of one encrypt or decrypt call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CipherSummary {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub chunks: u64,
}

/// Stateless cipher engine. Holds only validated options; safe to share across threads.
#[derive(Debug, Clone)]
pub struct CipherEngine {
    chunk_size: u32,
}

impl Default for CipherEngine {
    fn default() -> Self {
        Self {
            chunk_size: CipherOptions::default().chunk_size,
        }
    }
}

impl CipherEngine {
    pub fn new(options: CipherOptions) -> CipherResult<Self> {
        validate_chunk_size(options.chunk_size)?;
        Ok(Self {
            chunk_size: options.chunk_size,
        })
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Encrypt `input` into a container written to `output`.
    pub fn encrypt<R: Read, W: Write>(
        &self,
        key: &Key,
        mut input: R,
        mut output: W,
        ctl: &StreamControl<'_>,
    ) -> CipherResult<CipherSummary> {
        let header = Header::generate(self.chunk_size)?;
        let cipher = file_cipher(key, &header)?;

        let preamble = header.to_bytes();
        let header_tag = seal(&cipher, &header, HEADER_TAG_COUNTER, &[], &preamble)?;
        output
            .write_all(&preamble)
            .map_err(|e| CipherError::io("writing container header", e))?;
        output
            .write_all(&header_tag)
            .map_err(|e| CipherError::io("writing container header", e))?;

        let mut summary = CipherSummary {
            bytes_out: HEADER_LEN as u64,
            ..CipherSummary::default()
        };

        let chunk_len = self.chunk_size as usize;
        let mut cur = Zeroizing::new(vec![0u8; chunk_len]);
        let mut next = Zeroizing::new(vec![0u8; chunk_len]);
        let mut pending =
            read_full(&mut input, &mut cur).map_err(|e| CipherError::io("reading input", e))?;
        let mut counter = 0u64;

        loop {
            ctl.check_cancelled()?;

            // A full chunk is only final if nothing follows it
            let (last, ahead) = if pending < chunk_len {
                (true, 0)
            } else {
                let ahead = read_full(&mut input, &mut next)
                    .map_err(|e| CipherError::io("reading input", e))?;
                (ahead == 0, ahead)
            };

            let sealed = seal(
                &cipher,
                &header,
                counter,
                &cur[..pending],
                &chunk_aad(counter, last),
            )?;
            output
                .write_all(&sealed)
                .map_err(|e| CipherError::io("writing container", e))?;

            summary.bytes_in += pending as u64;
            summary.bytes_out += sealed.len() as u64;
            summary.chunks += 1;
            ctl.report(summary.bytes_in);

            if last {
                break;
            }
            std::mem::swap(&mut cur, &mut next);
            pending = ahead;
            counter += 1;
        }

        output
            .flush()
            .map_err(|e| CipherError::io("flushing container", e))?;

        tracing::debug!(
            chunks = summary.chunks,
            bytes = summary.bytes_in,
            "container written"
        );
        Ok(summary)
    }

    /// Decrypt a container read from `input`, writing plaintext to `output`.
    ///
    /// Each chunk is authenticated before any of its plaintext is written.
    /// The chunk size recorded in the header is used, not the engine's own.
    pub fn decrypt<R: Read, W: Write>(
        &self,
        key: &Key,
        mut input: R,
        mut output: W,
        ctl: &StreamControl<'_>,
    ) -> CipherResult<CipherSummary> {
        let (header, header_tag) = Header::read_from(&mut input)?;
        let cipher = file_cipher(key, &header)?;

        open(
            &cipher,
            &header,
            HEADER_TAG_COUNTER,
            &header_tag,
            &header.to_bytes(),
        )
        .inspect_err(|_| tracing::warn!("container header failed authentication"))?;

        let mut summary = CipherSummary {
            bytes_in: HEADER_LEN as u64,
            ..CipherSummary::default()
        };

        let block_len = header.sealed_chunk_len();
        let mut cur = vec![0u8; block_len];
        let mut next = vec![0u8; block_len];
        let mut pending =
            read_full(&mut input, &mut cur).map_err(|e| CipherError::io("reading container", e))?;
        if pending == 0 {
            return Err(CipherError::MalformedContainer(
                "container has no chunks".into(),
            ));
        }
        let mut counter = 0u64;

        loop {
            ctl.check_cancelled()?;

            let (last, ahead) = if pending < block_len {
                (true, 0)
            } else {
                let ahead = read_full(&mut input, &mut next)
                    .map_err(|e| CipherError::io("reading container", e))?;
                (ahead == 0, ahead)
            };

            if pending < TAG_SIZE {
                return Err(CipherError::MalformedContainer(format!(
                    "chunk {counter} truncated to {pending} bytes"
                )));
            }

            let plaintext = open(
                &cipher,
                &header,
                counter,
                &cur[..pending],
                &chunk_aad(counter, last),
            )
            .inspect_err(|_| tracing::warn!(chunk = counter, "chunk failed authentication"))?;
            output
                .write_all(&plaintext)
                .map_err(|e| CipherError::io("writing output", e))?;

            summary.bytes_in += pending as u64;
            summary.bytes_out += plaintext.len() as u64;
            summary.chunks += 1;
            ctl.report(summary.bytes_in);

            if last {
                break;
            }
            std::mem::swap(&mut cur, &mut next);
            pending = ahead;
            counter += 1;
        }

        output
            .flush()
            .map_err(|e| CipherError::io("flushing output", e))?;

        tracing::debug!(
            chunks = summary.chunks,
            bytes = summary.bytes_out,
            "container decrypted"
        );
        Ok(summary)
    }

    /// Encrypt a file. The container only appears at `output` once complete.
    pub fn encrypt_file(
        &self,
        key: &Key,
        input: &Path,
        output: &Path,
        ctl: &StreamControl<'_>,
    ) -> CipherResult<CipherSummary> {
        transform_file(input, output, ctl, |reader, writer, ctl| {
            self.encrypt(key, reader, writer, ctl)
        })
    }

    /// Decrypt a file. Plaintext only appears at `output` once every chunk authenticated.
    pub fn decrypt_file(
        &self,
        key: &Key,
        input: &Path,
        output: &Path,
        ctl: &StreamControl<'_>,
    ) -> CipherResult<CipherSummary> {
        transform_file(input, output, ctl, |reader, writer, ctl| {
            self.decrypt(key, reader, writer, ctl)
        })
    }
}

/// Run `op` from `input` into a temporary file beside `output`, then rename it
/// into place. On error or cancellation the temporary file is removed and
/// `output` is left untouched.
fn transform_file<F>(
    input: &Path,
    output: &Path,
    ctl: &StreamControl<'_>,
    op: F,
) -> CipherResult<CipherSummary>
where
    F: FnOnce(File, &mut BufWriter<&File>, &StreamControl<'_>) -> CipherResult<CipherSummary>,
{
    let reader = File::open(input)
        .map_err(|e| CipherError::io(format!("opening {}", input.display()), e))?;
    let total_bytes = reader.metadata().map(|m| m.len()).unwrap_or(0);
    let ctl = StreamControl {
        total_bytes,
        ..*ctl
    };

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".nalenc-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| CipherError::io(format!("creating output in {}", dir.display()), e))?;

    let summary = {
        let mut writer = BufWriter::new(tmp.as_file());
        let summary = op(reader, &mut writer, &ctl)?;
        writer
            .into_inner()
            .map_err(|e| CipherError::io("flushing output", e.into_error()))?;
        summary
    };

    tmp.as_file()
        .sync_all()
        .map_err(|e| CipherError::io("syncing output", e))?;
    tmp.persist(output)
        .map_err(|e| CipherError::io(format!("writing {}", output.display()), e.error))?;

    Ok(summary)
}

/// Derive the per-container file key and build the AEAD cipher from it.
fn file_cipher(key: &Key, header: &Header) -> CipherResult<XChaCha20Poly1305> {
    let hkdf = Hkdf::<Sha256>::new(Some(&header.nonce), key.as_bytes());
    let mut file_key = Zeroizing::new([0u8; FILE_KEY_SIZE]);
    hkdf.expand(FILE_KEY_INFO, file_key.as_mut_slice())
        .map_err(|e| CipherError::CryptoFailure(format!("HKDF expand failed: {e}")))?;
    Ok(XChaCha20Poly1305::new((&*file_key).into()))
}

fn seal(
    cipher: &XChaCha20Poly1305,
    header: &Header,
    counter: u64,
    plaintext: &[u8],
    aad: &[u8],
) -> CipherResult<Vec<u8>> {
    let nonce_bytes = header.chunk_nonce(counter);
    cipher
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CipherError::CryptoFailure(format!("chunk encryption failed: {e}")))
}

fn open(
    cipher: &XChaCha20Poly1305,
    header: &Header,
    counter: u64,
    sealed: &[u8],
    aad: &[u8],
) -> CipherResult<Zeroizing<Vec<u8>>> {
    let nonce_bytes = header.chunk_nonce(counter);
    cipher
        .decrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload { msg: sealed, aad },
        )
        .map(Zeroizing::new)
        .map_err(|_| CipherError::AuthenticationError)
}
