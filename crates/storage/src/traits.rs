use crate::{KeyValue, Result, StorageError};
use std::any::Any;

/// Core database operations trait
pub trait Database: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Create a new batch for atomic writes
    fn batch(&self) -> Box<dyn WriteBatch>;

    /// Execute a batch of operations atomically
    fn write_batch(&self, batch: Box<dyn WriteBatch>) -> Result<()>;

    /// Create an iterator over keys starting with `prefix`
    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn DatabaseIterator + '_>;
}

/// Batch operations for atomic writes
pub trait WriteBatch: Send {
    /// Add a put operation to the batch
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Add a delete operation to the batch
    fn delete(&mut self, key: &[u8]);

    /// Get the number of operations in the batch
    fn len(&self) -> usize;

    /// Check if the batch is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recover the concrete batch inside `write_batch`
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Database iterator trait
pub trait DatabaseIterator: Send {
    /// Move to the next item
    fn next(&mut self) -> Option<Result<KeyValue>>;
}

/// Extension trait for typed access to database
pub trait TypedDatabase: Database {
    /// Get a value and deserialize it
    fn get_typed<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Serialize and put a value
    fn put_typed<T: serde::Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        self.put(key, &encode(value)?)
    }

    /// Deserialize every value stored under `prefix`, in key order
    fn collect_prefix<T: serde::de::DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        let mut iter = self.iter_prefix(prefix);
        let mut out = Vec::new();
        while let Some(entry) = iter.next() {
            let (key, value) = entry?;
            out.push((key, decode(&value)?));
        }
        Ok(out)
    }
}

/// Implement TypedDatabase for all types that implement Database
impl<T: Database + ?Sized> TypedDatabase for T {}

/// Encode a value with the store's serialization format.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

/// Decode a value written by [`encode`].
pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDatabase;

    #[test]
    fn test_typed_roundtrip() {
        let db = MemoryDatabase::new();
        db.put_typed(b"k", &(42u64, "answer".to_string())).unwrap();

        let value: Option<(u64, String)> = db.get_typed(b"k").unwrap();
        assert_eq!(value, Some((42, "answer".to_string())));
        assert_eq!(db.get_typed::<u64>(b"missing").unwrap(), None);
    }

    #[test]
    fn test_collect_prefix_in_key_order() {
        let db = MemoryDatabase::new();
        db.put_typed(b"p\x02", &2u32).unwrap();
        db.put_typed(b"p\x01", &1u32).unwrap();
        db.put_typed(b"q\x01", &9u32).unwrap();

        let values: Vec<u32> = db
            .collect_prefix::<u32>(b"p")
            .unwrap()
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_corrupt_value_is_reported() {
        let db = MemoryDatabase::new();
        db.put(b"k", &[0xff]).unwrap();
        assert!(matches!(
            db.get_typed::<String>(b"k"),
            Err(StorageError::SerializationError(_))
        ));
    }
}
