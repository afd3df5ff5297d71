//! AES in cipher-block-chaining mode with an explicit chaining value.
//!
//! The encrypted file wrapper feeds ciphertext to disk across many `write`
//! calls, so the chaining value has to survive between calls. Rather than
//! relying on a streaming mode object that hides its IV, [`BlockCipherState`]
//! keeps the last ciphertext block as a plain field.
//!
//! # Chaining
//!
//! ```text
//! C[0] = E(K, P[0] ^ seed)
//! C[i] = E(K, P[i] ^ C[i-1])
//! ```
//!
//! The seed is the random block stored at the start of every encrypted file.

use std::fmt;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};

use super::CryptoError;

/// Cipher block size in bytes (AES).
pub const BLOCK_SIZE: usize = 16;

/// The AES variant picked from the raw key length.
enum AesCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCipher {
    fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = CryptoError::InvalidKeyLength { actual: key.len() };
        match key.len() {
            16 => Aes128::new_from_slice(key)
                .map(AesCipher::Aes128)
                .map_err(|_| invalid),
            24 => Aes192::new_from_slice(key)
                .map(AesCipher::Aes192)
                .map_err(|_| invalid),
            32 => Aes256::new_from_slice(key)
                .map(AesCipher::Aes256)
                .map_err(|_| invalid),
            _ => Err(invalid),
        }
    }

    fn encrypt_block(&self, block: &mut Block) {
        match self {
            AesCipher::Aes128(c) => c.encrypt_block(block),
            AesCipher::Aes192(c) => c.encrypt_block(block),
            AesCipher::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut Block) {
        match self {
            AesCipher::Aes128(c) => c.decrypt_block(block),
            AesCipher::Aes192(c) => c.decrypt_block(block),
            AesCipher::Aes256(c) => c.decrypt_block(block),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AesCipher::Aes128(_) => "AES-128-CBC",
            AesCipher::Aes192(_) => "AES-192-CBC",
            AesCipher::Aes256(_) => "AES-256-CBC",
        }
    }
}

#[inline]
fn xor_in_place(dst: &mut [u8], src: &[u8; BLOCK_SIZE]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

fn check_aligned(buf: &[u8]) -> Result<(), CryptoError> {
    if buf.len() % BLOCK_SIZE == 0 {
        Ok(())
    } else {
        Err(CryptoError::UnalignedBuffer { len: buf.len() })
    }
}

/// CBC state carried across calls.
///
/// One instance is used in a single direction: an encrypting state belongs
/// to a file writer, a decrypting state to a sequential reader. Calls must
/// follow file order; encrypting blocks out of order corrupts every block
/// chained after them.
pub struct BlockCipherState {
    cipher: AesCipher,
    chain: [u8; BLOCK_SIZE],
}

impl BlockCipherState {
    /// Build a state from a raw key and the chaining seed.
    ///
    /// The key length selects AES-128, AES-192 or AES-256.
    pub fn new(key: &[u8], seed: &[u8; BLOCK_SIZE]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: AesCipher::new(key)?,
            chain: *seed,
        })
    }

    /// Current chaining value (the last ciphertext block seen).
    pub fn chain(&self) -> &[u8; BLOCK_SIZE] {
        &self.chain
    }

    /// Replace the chaining value.
    ///
    /// Only used while opening a file, to continue after the last
    /// block-aligned ciphertext block already on disk.
    pub fn resume_from(&mut self, chain: [u8; BLOCK_SIZE]) {
        self.chain = chain;
    }

    /// Encrypt `buf` in place and advance the chaining value.
    pub fn encrypt_blocks(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        check_aligned(buf)?;
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            xor_in_place(chunk, &self.chain);
            let mut block = Block::clone_from_slice(chunk);
            self.cipher.encrypt_block(&mut block);
            chunk.copy_from_slice(block.as_slice());
            self.chain.copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Decrypt `buf` in place and advance the chaining value.
    pub fn decrypt_blocks(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        check_aligned(buf)?;
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let mut ciphertext = [0u8; BLOCK_SIZE];
            ciphertext.copy_from_slice(chunk);

            let mut block = Block::from(ciphertext);
            self.cipher.decrypt_block(&mut block);
            chunk.copy_from_slice(block.as_slice());
            xor_in_place(chunk, &self.chain);
            self.chain = ciphertext;
        }
        Ok(())
    }

    /// Encrypt a single block against the current chaining value without
    /// advancing it.
    ///
    /// The trailing remainder block of a file is provisional: the next write
    /// overwrites it with the completed block, which must chain from the same
    /// value.
    pub fn seal_tail(&self, plaintext: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = *plaintext;
        xor_in_place(&mut out, &self.chain);
        let mut block = Block::from(out);
        self.cipher.encrypt_block(&mut block);
        out.copy_from_slice(block.as_slice());
        out
    }
}

impl fmt::Debug for BlockCipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCipherState")
            .field("cipher", &self.cipher.name())
            .field("chain", &hex::encode(self.chain))
            .finish()
    }
}
