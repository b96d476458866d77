use crate::config::{StorageBackend, StorageConfig};
#[cfg(feature = "rocksdb")]
use aioracle_storage::RocksDatabase;
use aioracle_storage::{Database, MemoryDatabase};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

const SNAPSHOT_FILE: &str = "state.bin";
#[cfg(feature = "rocksdb")]
const ROCKSDB_DIR: &str = "statedb";

/// Oracle state store in a data directory.
pub enum StateStore {
    /// Snapshot file loaded into memory and rewritten on commit
    Snapshot { db: MemoryDatabase, path: PathBuf },
    #[cfg(feature = "rocksdb")]
    Rocks(RocksDatabase),
}

impl StateStore {
    /// Open the store configured for `datadir`, creating the directory if needed.
    pub fn open(backend: StorageBackend, datadir: &Path) -> Result<Self> {
        std::fs::create_dir_all(datadir)
            .with_context(|| format!("Failed to create data directory {}", datadir.display()))?;

        match backend {
            StorageBackend::Memory => {
                let path = datadir.join(SNAPSHOT_FILE);
                let db = if path.exists() {
                    info!("Opening state snapshot at {}", path.display());
                    MemoryDatabase::load_snapshot(&path)
                        .with_context(|| format!("Failed to load {}", path.display()))?
                } else {
                    MemoryDatabase::new()
                };
                Ok(StateStore::Snapshot { db, path })
            }
            #[cfg(feature = "rocksdb")]
            StorageBackend::Rocksdb => {
                let path = datadir.join(ROCKSDB_DIR);
                info!("Opening state database at {}", path.display());
                Ok(StateStore::Rocks(RocksDatabase::open(&path)?))
            }
            #[cfg(not(feature = "rocksdb"))]
            StorageBackend::Rocksdb => {
                anyhow::bail!("storage backend 'rocksdb' requires building with the rocksdb feature")
            }
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::open(config.backend, &config.datadir)
    }

    pub fn db(&self) -> &dyn Database {
        match self {
            StateStore::Snapshot { db, .. } => db,
            #[cfg(feature = "rocksdb")]
            StateStore::Rocks(db) => db,
        }
    }

    /// Make everything written through [`StateStore::db`] durable.
    pub fn commit(&self) -> Result<()> {
        match self {
            StateStore::Snapshot { db, path } => db
                .save_snapshot(path)
                .with_context(|| format!("Failed to write {}", path.display())),
            #[cfg(feature = "rocksdb")]
            StateStore::Rocks(db) => db.flush().context("Failed to flush state database"),
        }
    }
}
