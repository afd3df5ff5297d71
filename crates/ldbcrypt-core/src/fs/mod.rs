//! Storage files: plain and encrypted wrappers around raw handles

pub mod desc;
pub mod encrypted;
pub mod error;
pub mod footer;
pub mod handle;
pub mod plain;
pub mod reader;
pub mod remainder;

// Re-export commonly used types
pub use desc::{FileDesc, FileType};
pub use encrypted::EncryptedFile;
pub use footer::{EMPTY_FILE_LEN, FOOTER_SIZE, SEED_SIZE, TrailingFooter};
pub use handle::{RawFile, StorageFile};
pub use plain::PlainFile;
pub use reader::{DecryptedContents, decrypt_contents, decrypt_file};
pub use remainder::RemainderBuffer;
