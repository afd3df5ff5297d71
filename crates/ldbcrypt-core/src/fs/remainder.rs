//! Plaintext bytes that do not yet fill a cipher block.

use std::fmt;

use zeroize::Zeroize;

use crate::crypto::BLOCK_SIZE;
use crate::util::min_u64;

/// Fixed-capacity buffer for the unencrypted tail of a file.
///
/// Holds at most `BLOCK_SIZE - 1` bytes between writes: as soon as a block
/// fills up it is handed to the cipher. The bytes are zeroized on clear and
/// on drop.
#[derive(Clone, Default)]
pub struct RemainderBuffer {
    buf: [u8; BLOCK_SIZE],
    len: usize,
}

impl RemainderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `bytes`; anything past one block is ignored.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut rem = Self::new();
        rem.extend(bytes);
        rem
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append as much of `bytes` as fits; returns the number taken.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let space = (BLOCK_SIZE - self.len) as u64;
        // Safe cast: bounded by the block size
        #[allow(clippy::cast_possible_truncation)]
        let take = min_u64(bytes.len() as u64, space) as usize;
        self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        take
    }

    /// The buffered bytes zero-padded to a full block.
    pub fn padded_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..self.len].copy_from_slice(self.as_slice());
        block
    }

    pub fn clear(&mut self) {
        self.buf.zeroize();
        self.len = 0;
    }
}

impl Drop for RemainderBuffer {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

impl fmt::Debug for RemainderBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemainderBuffer")
            .field("len", &self.len)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
