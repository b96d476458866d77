//! Identifiers shared by the registry and the request store.

use crate::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Request identifier. Allocated from 1 upwards, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const FIRST: RequestId = RequestId(1);

    pub fn new(id: u64) -> Self {
        RequestId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The identifier that follows this one, `None` on exhaustion.
    pub fn next(&self) -> Option<RequestId> {
        self.0.checked_add(1).map(RequestId)
    }

    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId(id)
    }
}

fn validate_tag(s: &str) -> Result<()> {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return Err(TypesError::InvalidFormatTag(s.to_string()));
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                validate_tag(&value)?;
                Ok($name(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self> {
                $name::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypesError;

            fn try_from(value: String) -> Result<Self> {
                $name::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Model name as registered by an administrator, e.g. `gpt-4o`.
    ModelId
);

string_id!(
    /// Opaque data format tag, conventionally `scheme:kind` such as `ipfs:img`.
    FormatTag
);

/// An (input, output) format combination accepted by a model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormatPair {
    pub input: FormatTag,
    pub output: FormatTag,
}

impl FormatPair {
    pub fn new(input: FormatTag, output: FormatTag) -> Self {
        Self { input, output }
    }

    /// Build a pair from raw tag strings.
    pub fn parse(input: &str, output: &str) -> Result<Self> {
        Ok(Self::new(FormatTag::new(input)?, FormatTag::new(output)?))
    }
}

impl fmt::Display for FormatPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_sequence() {
        let first = RequestId::FIRST;
        assert_eq!(first.as_u64(), 1);
        assert_eq!(first.next(), Some(RequestId::new(2)));
        assert_eq!(RequestId::new(u64::MAX).next(), None);
        assert_eq!(first.to_string(), "#1");
    }

    #[test]
    fn test_tags_reject_blank_and_whitespace() {
        assert!(FormatTag::new("plain:text").is_ok());
        assert!(FormatTag::new("").is_err());
        assert!(ModelId::new("gpt 4").is_err());
    }

    #[test]
    fn test_tag_serde_validates() {
        let model: ModelId = serde_json::from_str("\"dall-e\"").unwrap();
        assert_eq!(model.as_str(), "dall-e");
        assert!(serde_json::from_str::<ModelId>("\"\"").is_err());

        let pair = FormatPair::parse("plain:text", "ipfs:img").unwrap();
        assert_eq!(pair.to_string(), "plain:text -> ipfs:img");
    }
}
