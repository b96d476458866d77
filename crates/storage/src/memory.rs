use crate::{decode, encode, Database, DatabaseIterator, KeyValue, Result, StorageError, WriteBatch};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// In-memory database implementation using BTreeMap
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryDatabase {
    /// Create a new empty in-memory database
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries in the database
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Load a database previously written with [`MemoryDatabase::save_snapshot`]
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let data: BTreeMap<Vec<u8>, Vec<u8>> = decode(&bytes)?;
        debug!(path = %path.as_ref().display(), entries = data.len(), "Loaded state snapshot");
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Write every entry to `path`, replacing the file through a rename
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = encode(&*self.data.read())?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), entries = self.len(), "Saved state snapshot");
        Ok(())
    }
}

impl Database for MemoryDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemoryBatch::default())
    }

    fn write_batch(&self, batch: Box<dyn WriteBatch>) -> Result<()> {
        let batch = batch
            .into_any()
            .downcast::<MemoryBatch>()
            .map_err(|_| StorageError::InvalidData("Invalid batch type".to_string()))?;

        // Single write guard: readers never observe half a batch.
        let mut data = self.data.write();
        for op in batch.operations {
            match op {
                BatchOp::Put(key, value) => {
                    data.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    data.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn DatabaseIterator + '_> {
        let data = self.data.read();
        let entries: Vec<_> = data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(MemoryIterator { entries: entries.into_iter() })
    }
}

/// Batch operations for memory database
#[derive(Debug)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Memory database batch implementation
#[derive(Debug, Default)]
struct MemoryBatch {
    operations: Vec<BatchOp>,
}

impl WriteBatch for MemoryBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.operations.push(BatchOp::Put(key.to_vec(), value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.operations.push(BatchOp::Delete(key.to_vec()));
    }

    fn len(&self) -> usize {
        self.operations.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Memory database iterator over a copied range
struct MemoryIterator {
    entries: std::vec::IntoIter<KeyValue>,
}

impl DatabaseIterator for MemoryIterator {
    fn next(&mut self) -> Option<Result<KeyValue>> {
        self.entries.next().map(Ok)
    }
}
