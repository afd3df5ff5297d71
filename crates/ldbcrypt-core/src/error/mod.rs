//! Error types for the storage crate
//!
//! Re-exports the error enums and their context structures from the modules
//! that raise them.

pub use crate::crypto::CryptoError;
pub use crate::fs::error::{FileContext, StorageError};
