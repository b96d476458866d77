use crate::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Opaque byte payload: request data and response segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn new() -> Self {
        Bytes(Vec::new())
    }

    pub fn from_vec(vec: Vec<u8>) -> Self {
        Bytes(vec)
    }

    pub fn from_slice(slice: &[u8]) -> Self {
        Bytes(slice.to_vec())
    }

    /// Pack a short string into a zero-padded 32-byte word.
    pub fn bytes32_string(s: &str) -> Result<Self> {
        if s.len() > 31 {
            return Err(TypesError::InvalidLength {
                expected: 31,
                actual: s.len(),
            });
        }
        let mut word = vec![0u8; 32];
        word[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Bytes(word))
    }

    /// Inverse of [`Bytes::bytes32_string`]; trailing zero padding is dropped.
    pub fn to_bytes32_string(&self) -> Option<String> {
        if self.0.len() != 32 {
            return None;
        }
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(32);
        String::from_utf8(self.0[..end].to_vec()).ok()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Number of zero bytes, used when pricing calldata.
    pub fn zero_count(&self) -> usize {
        self.0.iter().filter(|&&b| b == 0).count()
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(vec: Vec<u8>) -> Self {
        Bytes::from_vec(vec)
    }
}

impl From<&[u8]> for Bytes {
    fn from(slice: &[u8]) -> Self {
        Bytes::from_slice(slice)
    }
}

impl From<&str> for Bytes {
    fn from(s: &str) -> Self {
        Bytes::from_slice(s.as_bytes())
    }
}

impl fmt::LowerHex for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
