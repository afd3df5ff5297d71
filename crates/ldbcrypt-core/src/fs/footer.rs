//! Trailing footer and on-disk layout of encrypted files.
//!
//! # File Layout
//!
//! | Offset | Size | Description |
//! |--------|------|-------------|
//! | 0 | 16 | Chaining seed (plaintext, random) |
//! | 16 | N × 16 | CBC ciphertext blocks |
//! | 16 + N × 16 | 0 or 16 | Trailing remainder block (zero padded before encryption) |
//! | len − 8 | 8 | Footer: offset of the end of the block-aligned region, little-endian |
//!
//! `len − 8` is always a multiple of the block size. A freshly created file
//! holds only the seed and a footer of 16.

use crate::crypto::BLOCK_SIZE;
use crate::fs::error::{FileContext, StorageError};

/// Footer size in bytes.
pub const FOOTER_SIZE: usize = 8;

/// Size of the chaining seed at the start of the file.
pub const SEED_SIZE: usize = BLOCK_SIZE;

/// Length of a freshly initialized encrypted file.
pub const EMPTY_FILE_LEN: u64 = (SEED_SIZE + FOOTER_SIZE) as u64;

const BLOCK: u64 = BLOCK_SIZE as u64;
const FOOTER: u64 = FOOTER_SIZE as u64;

/// The 8-byte little-endian value closing every encrypted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingFooter(u64);

impl TrailingFooter {
    pub const fn new(aligned_len: u64) -> Self {
        Self(aligned_len)
    }

    pub const fn from_bytes(bytes: [u8; FOOTER_SIZE]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; FOOTER_SIZE] {
        self.0.to_le_bytes()
    }

    /// Recorded offset of the block-aligned ciphertext region.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Remainder length implied by the footer when it is read back.
    ///
    /// Footers written by this crate are always block aligned, so this is
    /// zero for them; only foreign or hand-crafted files yield a non-zero
    /// remainder here.
    pub const fn remainder_len(self) -> u64 {
        self.0 % BLOCK
    }
}

/// Check that a raw file length can hold the encrypted layout.
///
/// An empty file is accepted (it has not been initialized yet).
pub fn validate_len(len: u64, context: &FileContext) -> Result<(), StorageError> {
    if len == 0 {
        return Ok(());
    }
    match len.checked_sub(FOOTER) {
        Some(body) if body % BLOCK == 0 => Ok(()),
        _ => Err(StorageError::corrupt(
            format!("invalid file length {len}: length minus {FOOTER_SIZE}-byte footer is not a multiple of {BLOCK_SIZE}"),
            context.clone(),
        )),
    }
}

/// Check a footer read from a file of `file_len` bytes.
///
/// The recorded offset must lie between the end of the seed and the start
/// of the footer. A block-aligned offset must also leave at most one
/// trailing block between itself and the footer.
pub fn validate_footer(
    footer: TrailingFooter,
    file_len: u64,
    context: &FileContext,
) -> Result<(), StorageError> {
    let max = file_len.saturating_sub(FOOTER);
    let value = footer.value();
    if value < SEED_SIZE as u64 || value > max {
        return Err(StorageError::corrupt(
            format!("footer offset {value} outside of data region {SEED_SIZE}..={max}"),
            context.clone().with_offset(max),
        ));
    }
    if footer.remainder_len() == 0 && value != max && value + BLOCK != max {
        return Err(StorageError::corrupt(
            format!("footer offset {value} leaves {} unaccounted bytes before the footer", max - value),
            context.clone().with_offset(max),
        ));
    }
    Ok(())
}
