//! Transparent AES-CBC encryption for append-only storage files.
//!
//! The engine writes arbitrary-length records; the cipher only takes whole
//! 16-byte blocks. [`EncryptedFile`] keeps the bytes that do not yet fill a
//! block in a [`RemainderBuffer`] and rewrites the end of the file on every
//! flush so that it always reads as
//!
//! ```text
//! [seed][ciphertext blocks][optional remainder block][footer]
//! ```
//!
//! The "tail" is everything after the block-aligned ciphertext: the
//! remainder block (if any) and the footer. Each write seeks back to the
//! start of the tail, appends newly completed blocks, and writes a new tail.
//!
//! See [`crate::fs::footer`] for the exact byte layout.

use std::{
    fmt,
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    sync::Arc,
};

use rand::RngCore;
use tracing::{debug, instrument, trace, warn};
use zeroize::Zeroizing;

use super::desc::FileDesc;
use super::error::{FileContext, StorageError};
use super::footer::{self, FOOTER_SIZE, SEED_SIZE, TrailingFooter};
use super::handle::{RawFile, StorageFile, TrackedHandle};
use super::remainder::RemainderBuffer;
use crate::crypto::{BLOCK_SIZE, BlockCipherState};
use crate::storage::state::FileSystemState;
use crate::util::max_u64;

const BLOCK: u64 = BLOCK_SIZE as u64;
const FOOTER: u64 = FOOTER_SIZE as u64;
const SEED: u64 = SEED_SIZE as u64;

/// Storage file whose bytes are persisted as CBC ciphertext.
///
/// Single writer: `write` and `sync` take `&mut self` and are not locked
/// internally.
pub struct EncryptedFile<F: RawFile = File> {
    handle: TrackedHandle<F>,
    cipher: BlockCipherState,
    remainder: RemainderBuffer,
    /// End of the block-aligned ciphertext; the tail starts here.
    tail_offset: u64,
}

impl<F: RawFile> EncryptedFile<F> {
    /// Wrap `file`, initializing it if it is empty.
    ///
    /// An empty file gets a random seed and an empty footer. An existing file
    /// must have a valid layout; its seed is read back, the footer is
    /// decoded and the chaining value continues from the last aligned block.
    ///
    /// # Errors
    ///
    /// - [`StorageError::CorruptFile`] when the length or footer is invalid.
    ///   Nothing is written to the file in that case.
    /// - [`StorageError::Crypto`] when `key` is not 16, 24 or 32 bytes.
    /// - [`StorageError::Io`] for failures of the raw handle.
    #[instrument(level = "debug", skip(file, fs, desc, key), fields(file = %desc))]
    pub fn open(
        mut file: F,
        fs: Arc<FileSystemState>,
        desc: FileDesc,
        key: &[u8],
    ) -> Result<Self, StorageError> {
        let context = FileContext::new()
            .with_desc(desc)
            .with_path(fs.path().join(desc.file_name()));
        let io_err = |e: io::Error| StorageError::io_with_context(e, context.clone());

        let mut len = file.seek(SeekFrom::End(0)).map_err(io_err)?;
        if let Err(err) = footer::validate_len(len, &context) {
            warn!(len, "Encrypted file has invalid length");
            return Err(err);
        }

        let seed = if len > SEED {
            let mut seed = [0u8; SEED_SIZE];
            read_exact_at(&mut file, 0, &mut seed).map_err(io_err)?;
            seed
        } else {
            let seed = initialize(&mut file).map_err(io_err)?;
            len = footer::EMPTY_FILE_LEN;
            debug!("Initialized new encrypted file");
            seed
        };

        let mut cipher = BlockCipherState::new(key, &seed)?;

        let mut footer_bytes = [0u8; FOOTER_SIZE];
        read_exact_at(&mut file, len - FOOTER, &mut footer_bytes).map_err(io_err)?;
        let trailer = TrailingFooter::from_bytes(footer_bytes);
        footer::validate_footer(trailer, len, &context)?;

        let n_rem = trailer.remainder_len();
        let (remainder, tail_offset) = if n_rem > 0 {
            if len < SEED + BLOCK + FOOTER {
                return Err(StorageError::corrupt(
                    format!("footer records {n_rem} pending bytes but the file has no trailing block"),
                    context.clone(),
                ));
            }
            let tail_offset = len - FOOTER - BLOCK;
            let mut block = Zeroizing::new([0u8; BLOCK_SIZE]);
            read_exact_at(&mut file, tail_offset, &mut block[..]).map_err(io_err)?;

            // Recovery mode: seeded like the writer and applied in the same
            // direction, not as the inverse transform.
            let mut recovery = BlockCipherState::new(key, &seed)?;
            recovery.encrypt_blocks(&mut block[..])?;

            // Safe cast: n_rem < BLOCK_SIZE
            #[allow(clippy::cast_possible_truncation)]
            let n_rem = n_rem as usize;
            (RemainderBuffer::from_slice(&block[..n_rem]), tail_offset)
        } else {
            (RemainderBuffer::new(), trailer.value())
        };

        if tail_offset > SEED {
            let mut last = [0u8; BLOCK_SIZE];
            read_exact_at(&mut file, tail_offset - BLOCK, &mut last).map_err(io_err)?;
            cipher.resume_from(last);
        }

        file.seek(SeekFrom::End(0)).map_err(io_err)?;

        debug!(
            len,
            footer = trailer.value(),
            remainder = remainder.len(),
            "Encrypted file opened"
        );

        Ok(Self {
            handle: TrackedHandle::new(file, fs, desc),
            cipher,
            remainder,
            tail_offset,
        })
    }

    /// End of the block-aligned ciphertext region.
    pub fn aligned_len(&self) -> u64 {
        self.tail_offset
    }

    /// Plaintext bytes buffered until they fill a block.
    pub fn remainder(&self) -> &[u8] {
        self.remainder.as_slice()
    }

    /// Persist the buffered remainder as the trailing block, followed by a
    /// footer pointing at the start of that block.
    fn write_remainder(&mut self) -> io::Result<()> {
        if self.remainder.is_empty() {
            return Ok(());
        }

        let flen = self.tail_offset;
        let plaintext = Zeroizing::new(self.remainder.padded_block());
        let block = self.cipher.seal_tail(&plaintext);

        let file = self.handle.io_file()?;
        file.seek(SeekFrom::Start(flen))?;
        file.write_all(&block)?;
        file.write_all(&TrailingFooter::new(flen).to_bytes())?;
        file.set_len(flen + BLOCK + FOOTER)?;

        trace!(offset = flen, pending = self.remainder.len(), "Wrote remainder block");
        Ok(())
    }

    /// Write a bare footer at `flen`, dropping any old tail behind it.
    fn write_footer(&mut self, flen: u64) -> io::Result<()> {
        let file = self.handle.io_file()?;
        file.seek(SeekFrom::Start(flen))?;
        file.write_all(&TrailingFooter::new(flen).to_bytes())?;
        file.set_len(flen + FOOTER)
    }
}

/// Give an empty (or footer-only) file a fresh random seed and empty footer.
fn initialize<F: RawFile>(file: &mut F) -> io::Result<[u8; SEED_SIZE]> {
    let mut seed = [0u8; SEED_SIZE];
    rand::rng().fill_bytes(&mut seed);

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&seed)?;
    file.write_all(&TrailingFooter::new(SEED).to_bytes())?;
    Ok(seed)
}

fn read_exact_at<F: RawFile>(file: &mut F, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

impl<F: RawFile> Read for EncryptedFile<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.io_file()?.read(buf)
    }
}

impl<F: RawFile> Seek for EncryptedFile<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle.io_file()?.seek(pos)
    }
}

impl<F: RawFile> StorageFile for EncryptedFile<F> {
    fn desc(&self) -> FileDesc {
        self.handle.desc()
    }

    /// Encrypt and append `data`.
    ///
    /// Completed blocks are encrypted and written at the start of the old
    /// tail, then a new tail is written. The trailing remainder block is
    /// rewritten only when bytes were already pending before this call;
    /// otherwise the new remainder stays in memory until the next write or
    /// `sync`.
    ///
    /// If the block write itself fails, the error is a [`StorageError::Io`]
    /// and the chaining value and pending bytes are left as they were, so a
    /// later write starts from the same tail. If the tail cannot be written
    /// after the blocks went out, the error is a
    /// [`StorageError::PartialWrite`] counting the bytes of `data` that were
    /// flushed as blocks.
    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let context = self.handle.context();
        let file = self.handle.file_mut()?;
        if data.is_empty() {
            return Ok(0);
        }

        file.seek(SeekFrom::Start(self.tail_offset))
            .map_err(|e| StorageError::io_with_context(e, context.clone()))?;

        let pending = self.remainder.len() as u64;
        let round = (data.len() as u64 + pending) / BLOCK * BLOCK;
        // Safe cast: nbw <= data.len()
        #[allow(clippy::cast_possible_truncation)]
        let nbw = (max_u64(round, pending) - pending) as usize;

        if round > 0 {
            // Safe cast: round <= data.len() + BLOCK_SIZE
            #[allow(clippy::cast_possible_truncation)]
            let mut buf = Zeroizing::new(Vec::with_capacity(round as usize));
            buf.extend_from_slice(self.remainder.as_slice());
            buf.extend_from_slice(&data[..nbw]);

            // Chain and remainder only move once the blocks are on disk.
            let saved_chain = *self.cipher.chain();
            self.cipher.encrypt_blocks(&mut buf)?;
            if let Err(e) = file.write_all(&buf) {
                self.cipher.resume_from(saved_chain);
                warn!(context = %context, error = %e, "Block write failed");
                return Err(StorageError::io_with_context(
                    e,
                    context.clone().with_offset(self.tail_offset),
                ));
            }
            self.remainder.clear();
        }

        let partial = |source: io::Error| StorageError::PartialWrite {
            written: nbw,
            source,
            context: context.clone(),
        };

        let flen = file.stream_position().map_err(partial)?;
        self.tail_offset = flen;

        self.remainder.extend(&data[nbw..]);
        if !self.remainder.is_empty() && pending > 0 {
            self.write_remainder().map_err(partial)?;
        } else {
            self.write_footer(flen).map_err(partial)?;
        }

        trace!(
            file = %self.handle.desc(),
            len = data.len(),
            flushed = nbw,
            pending = self.remainder.len(),
            aligned = flen,
            "Encrypted write"
        );
        Ok(data.len())
    }

    #[instrument(level = "debug", skip(self), fields(file = %self.handle.desc()))]
    fn sync(&mut self) -> Result<(), StorageError> {
        let context = self.handle.context();
        self.handle.file_mut()?;

        if !self.remainder.is_empty() {
            self.write_remainder()
                .map_err(|e| StorageError::io_with_context(e, context))?;
        }
        self.handle.sync_durable()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.handle.close()
    }
}

impl<F: RawFile> fmt::Debug for EncryptedFile<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFile")
            .field("handle", &self.handle)
            .field("cipher", &self.cipher)
            .field("remainder", &self.remainder)
            .field("tail_offset", &self.tail_offset)
            .finish()
    }
}
