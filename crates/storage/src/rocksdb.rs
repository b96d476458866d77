use rocksdb::{Direction, IteratorMode, Options, WriteBatch as RocksWriteBatch, DB};
use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use crate::{Database, DatabaseIterator, KeyValue, Result, StorageError, WriteBatch as WriteBatchTrait};

fn db_error(e: rocksdb::Error) -> StorageError {
    StorageError::DatabaseError(e.to_string())
}

/// RocksDB-backed store for long-running deployments.
pub struct RocksDatabase {
    db: Arc<DB>,
}

impl RocksDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_max_open_files(1024);

        let db = DB::open(&opts, path).map_err(db_error)?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(db_error)
    }
}

impl Database for RocksDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.get(key).map_err(db_error)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put(key, value).map_err(db_error)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db.delete(key).map_err(db_error)
    }

    fn batch(&self) -> Box<dyn WriteBatchTrait> {
        Box::new(RocksBatch {
            batch: RocksWriteBatch::default(),
        })
    }

    fn write_batch(&self, batch: Box<dyn WriteBatchTrait>) -> Result<()> {
        let rocks_batch = batch
            .into_any()
            .downcast::<RocksBatch>()
            .map_err(|_| StorageError::InvalidData("Invalid batch type".to_string()))?;

        self.db.write(rocks_batch.batch).map_err(db_error)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn DatabaseIterator + '_> {
        Box::new(RocksPrefixIterator {
            iter: self.db.iterator(IteratorMode::From(prefix, Direction::Forward)),
            prefix: prefix.to_vec(),
        })
    }
}

pub struct RocksBatch {
    batch: RocksWriteBatch,
}

impl WriteBatchTrait for RocksBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.batch.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.batch.delete(key);
    }

    fn len(&self) -> usize {
        self.batch.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Forward iterator that stops at the first key outside `prefix`.
pub struct RocksPrefixIterator<'a> {
    iter: rocksdb::DBIterator<'a>,
    prefix: Vec<u8>,
}

impl<'a> DatabaseIterator for RocksPrefixIterator<'a> {
    fn next(&mut self) -> Option<Result<KeyValue>> {
        match self.iter.next()? {
            Ok((k, v)) if k.starts_with(&self.prefix) => Some(Ok((k.to_vec(), v.to_vec()))),
            Ok(_) => None,
            Err(e) => Some(Err(db_error(e))),
        }
    }
}
