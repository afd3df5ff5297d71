pub mod crypto;
pub mod error;
pub mod fs;
pub mod storage;
pub mod util;

pub use crypto::{CipherKey, KeySize};
pub use error::StorageError;
pub use fs::{EncryptedFile, FileDesc, FileType, PlainFile, StorageFile};
pub use storage::{FileStorage, StorageOptions};
