pub mod address;
pub mod amount;
pub mod bytes;
pub mod ids;

pub use address::Address;
pub use amount::{format_units, parse_units, DEFAULT_DECIMALS};
pub use bytes::Bytes;
pub use ids::{FormatPair, FormatTag, ModelId, RequestId};
pub use primitive_types::{H160, H256, U256};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid format tag: {0}")]
    InvalidFormatTag(String),

    #[error("Overflow in arithmetic operation")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, TypesError>;
