//! Raw symmetric keys supplied by the caller.
//!
//! No derivation happens here: the caller hands over the exact key bytes and
//! their length selects AES-128, AES-192 or AES-256.

use std::fmt;

use rand::RngCore;
use zeroize::Zeroizing;

use super::CryptoError;

/// AES key sizes accepted by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    /// Key length in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes192 => 24,
            KeySize::Aes256 => 32,
        }
    }

    /// Key size for a raw key of `len` bytes, if AES supports it.
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(KeySize::Aes128),
            24 => Some(KeySize::Aes192),
            32 => Some(KeySize::Aes256),
            _ => None,
        }
    }
}

/// A validated raw AES key.
///
/// The bytes are wrapped in `Zeroizing` so they are erased on drop, and the
/// `Debug` implementation never prints them.
#[derive(Clone)]
pub struct CipherKey {
    bytes: Zeroizing<Vec<u8>>,
    size: KeySize,
}

impl CipherKey {
    /// Validate and take a copy of `bytes`.
    pub fn new(bytes: &[u8]) -> Result<Self, CryptoError> {
        let size = KeySize::from_len(bytes.len()).ok_or(CryptoError::InvalidKeyLength {
            actual: bytes.len(),
        })?;
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
            size,
        })
    }

    /// Generate a fresh random key of the given size.
    pub fn random(size: KeySize) -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; size.byte_len()]);
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes, size }
    }

    pub fn size(&self) -> KeySize {
        self.size
    }

    /// Borrow the raw key bytes.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherKey")
            .field("size", &self.size)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
