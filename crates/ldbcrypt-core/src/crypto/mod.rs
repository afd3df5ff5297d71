//! Cryptographic primitives for the encrypted file layer

pub mod cbc;
pub mod key;

use thiserror::Error;

/// Errors raised by the cipher primitives.
///
/// Both variants are **[PROGRAMMING ERROR]**s from the point of view of the
/// storage layer: keys are validated when [`crate::storage::StorageOptions`]
/// are built, and the file wrappers only ever hand whole blocks to the cipher.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The raw key does not match any AES variant.
    #[error("Invalid key length: expected 16, 24 or 32 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    /// A buffer handed to the block transform is not block aligned.
    #[error("Buffer of {len} bytes is not a multiple of the cipher block size")]
    UnalignedBuffer { len: usize },
}

pub use cbc::{BLOCK_SIZE, BlockCipherState};
pub use key::{CipherKey, KeySize};
