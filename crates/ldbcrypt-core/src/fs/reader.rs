//! Offline reconstruction of encrypted files.
//!
//! The engine reads encrypted files back through the raw handle; this module
//! turns the on-disk bytes into plaintext in one pass, for tooling and
//! verification.

use std::{fmt, fs, path::Path};

use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use super::error::{FileContext, StorageError};
use super::footer::{self, FOOTER_SIZE, SEED_SIZE, TrailingFooter};
use crate::crypto::{BLOCK_SIZE, BlockCipherState};

const BLOCK: u64 = BLOCK_SIZE as u64;
const FOOTER: u64 = FOOTER_SIZE as u64;

/// Plaintext recovered from an encrypted file.
pub struct DecryptedContents {
    /// Decrypted block-aligned region.
    pub data: Zeroizing<Vec<u8>>,
    /// Decrypted trailing remainder block, zero padded, if the file has one.
    ///
    /// The footer does not record how many of its bytes are data.
    pub trailing: Option<[u8; BLOCK_SIZE]>,
}

impl DecryptedContents {
    /// Aligned plaintext followed by the trailing block with its zero padding
    /// stripped.
    ///
    /// Only exact when the data itself does not end in zero bytes.
    pub fn to_vec_trimmed(&self) -> Vec<u8> {
        let mut out = self.data.to_vec();
        if let Some(block) = &self.trailing {
            let end = block.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            out.extend_from_slice(&block[..end]);
        }
        out
    }
}

impl fmt::Debug for DecryptedContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedContents")
            .field("data_len", &self.data.len())
            .field("trailing", &self.trailing.is_some())
            .finish()
    }
}

/// Decrypt the raw bytes of an encrypted file.
///
/// # Errors
///
/// [`StorageError::CorruptFile`] when the layout or footer is invalid and
/// [`StorageError::Crypto`] when the key length is wrong.
pub fn decrypt_contents(raw: &[u8], key: &[u8]) -> Result<DecryptedContents, StorageError> {
    decrypt_with_context(raw, key, &FileContext::new())
}

/// Read and decrypt the encrypted file at `path`.
///
/// # Errors
///
/// As [`decrypt_contents`], plus [`StorageError::Io`] if the file cannot be
/// read.
pub fn decrypt_file(path: &Path, key: &[u8]) -> Result<DecryptedContents, StorageError> {
    let context = FileContext::new().with_path(path);
    let raw = fs::read(path).map_err(|e| StorageError::io_with_context(e, context.clone()))?;
    trace!(encrypted_size = raw.len(), "Read encrypted file");
    decrypt_with_context(&raw, key, &context)
}

fn decrypt_with_context(
    raw: &[u8],
    key: &[u8],
    context: &FileContext,
) -> Result<DecryptedContents, StorageError> {
    let len = raw.len() as u64;
    footer::validate_len(len, context)?;
    if len < footer::EMPTY_FILE_LEN {
        // Never initialized
        return Ok(DecryptedContents {
            data: Zeroizing::new(Vec::new()),
            trailing: None,
        });
    }

    let mut footer_bytes = [0u8; FOOTER_SIZE];
    footer_bytes.copy_from_slice(&raw[raw.len() - FOOTER_SIZE..]);
    let trailer = TrailingFooter::from_bytes(footer_bytes);
    footer::validate_footer(trailer, len, context)?;

    let aligned_end = if trailer.remainder_len() == 0 {
        trailer.value()
    } else if len >= footer::EMPTY_FILE_LEN + BLOCK {
        len - FOOTER - BLOCK
    } else {
        warn!(footer = trailer.value(), "Footer points into a missing trailing block");
        return Err(StorageError::corrupt(
            "footer records pending bytes but the file has no trailing block",
            context.clone(),
        ));
    };

    let mut seed = [0u8; SEED_SIZE];
    seed.copy_from_slice(&raw[..SEED_SIZE]);
    let mut cipher = BlockCipherState::new(key, &seed)?;

    // Safe cast: bounded by raw.len()
    #[allow(clippy::cast_possible_truncation)]
    let (aligned_end, body_end) = (aligned_end as usize, (len - FOOTER) as usize);

    let mut data = Zeroizing::new(raw[SEED_SIZE..aligned_end].to_vec());
    cipher.decrypt_blocks(&mut data)?;

    let trailing = if body_end > aligned_end {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&raw[aligned_end..aligned_end + BLOCK_SIZE]);
        cipher.decrypt_blocks(&mut block)?;
        Some(block)
    } else {
        None
    };

    debug!(
        plaintext_size = data.len(),
        trailing = trailing.is_some(),
        "Decrypted file contents"
    );
    Ok(DecryptedContents { data, trailing })
}
