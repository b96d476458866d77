use aioracle_engine::EngineConfig;
use aioracle_types::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete oracle configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine configuration
    pub oracle: OracleConfig,
    /// State storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub log: LogConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Address holding escrowed tokens on the ledger
    pub address: Address,
    /// Callback gas cap for requests that set none
    pub default_callback_gas_limit: u64,
    /// Maximum response segments per request
    pub max_segments: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory store persisted as a snapshot file
    Memory,
    /// RocksDB column store, requires the `rocksdb` feature
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory
    pub datadir: PathBuf,
    /// Storage backend
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level
    pub level: String,
    /// Enable JSON logging
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics
    pub enabled: bool,
    /// Print the metrics text exposition when a command finishes
    pub dump_on_exit: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            address: Address::from_low_u64_be(0xa10a),
            default_callback_gas_limit: engine.default_callback_gas_limit,
            max_segments: engine.max_segments,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            datadir: PathBuf::from("./data"),
            backend: StorageBackend::Memory,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dump_on_exit: false,
        }
    }
}

impl OracleConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_segments: self.max_segments,
            default_callback_gas_limit: self.default_callback_gas_limit,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context("Failed to read configuration file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, content)
            .context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.oracle.address.is_zero() {
            anyhow::bail!("oracle.address must not be the zero address");
        }

        if self.oracle.default_callback_gas_limit == 0 {
            anyhow::bail!("default_callback_gas_limit must be greater than 0");
        }

        if self.oracle.max_segments == Some(0) {
            anyhow::bail!("max_segments must be greater than 0 when set");
        }

        if self.storage.backend == StorageBackend::Rocksdb && !cfg!(feature = "rocksdb") {
            anyhow::bail!("storage backend 'rocksdb' requires building with the rocksdb feature");
        }

        if self.log.level.trim().is_empty() {
            anyhow::bail!("log.level must not be empty");
        }

        Ok(())
    }
}
