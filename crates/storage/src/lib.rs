use aioracle_types::{Address, ModelId, RequestId};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
pub mod traits;

pub use memory::*;
#[cfg(feature = "rocksdb")]
pub use rocksdb::*;
pub use traits::*;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("State layout version mismatch: stored {stored}, expected {expected}")]
    VersionMismatch { stored: u32, expected: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key-value pair type alias
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Key prefixes of the persisted oracle state.
///
/// The byte values are part of the on-disk layout and must never be reused
/// for a different record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Meta = 0x00,
    Escrow = 0x01,
    Model = 0x02,
    Request = 0x03,
    Role = 0x04,
}

impl KeyPrefix {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    pub fn make_key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(self.as_byte());
        key.extend_from_slice(suffix);
        key
    }
}

/// Key builders for each record type.
pub mod keys {
    use super::*;

    pub fn meta_key(name: &str) -> Vec<u8> {
        KeyPrefix::Meta.make_key(name.as_bytes())
    }

    pub fn escrow_key(owner: &Address) -> Vec<u8> {
        KeyPrefix::Escrow.make_key(owner.as_bytes())
    }

    pub fn model_key(model: &ModelId) -> Vec<u8> {
        KeyPrefix::Model.make_key(model.as_str().as_bytes())
    }

    /// Big-endian ids keep requests ordered under prefix iteration.
    pub fn request_key(id: RequestId) -> Vec<u8> {
        KeyPrefix::Request.make_key(&id.to_be_bytes())
    }

    pub fn role_key(role: u8, account: &Address) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 + 20);
        key.push(KeyPrefix::Role.as_byte());
        key.push(role);
        key.extend_from_slice(account.as_bytes());
        key
    }
}
