// Core modules
pub mod config;
pub mod genesis;
pub mod simulation;
pub mod store;

// Re-export commonly used types
pub use config::{Config, LogConfig, MetricsConfig, OracleConfig, StorageBackend, StorageConfig};
pub use genesis::{Genesis, GenesisAllocation, GenesisConfig, GenesisModel};
pub use simulation::SimulationReport;
pub use store::StateStore;

// Re-export crate modules
pub use aioracle_engine as engine;
pub use aioracle_storage as storage;
pub use aioracle_token as token;
pub use aioracle_types as types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get client version string
pub fn client_version() -> String {
    format!("aioracle/v{}/rust", VERSION)
}
