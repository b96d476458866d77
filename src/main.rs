use aioracle::{client_version, simulation, Config, Genesis, StateStore};
use aioracle_engine::{OracleMetrics, OracleState, Role};
use aioracle_token::{format_units, DEFAULT_DECIMALS};
use aioracle_types::{Address, RequestId};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prometheus::{Encoder, Registry, TextEncoder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aioracle")]
#[command(about = "Token-escrowed request lifecycle for off-chain AI inference", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the initial oracle state from a genesis file and persist it
    Init {
        /// Path to genesis file, defaults to the built-in testnet preset
        #[arg(short, long)]
        genesis: Option<PathBuf>,

        /// Data directory, overrides the configuration file
        #[arg(short, long)]
        datadir: Option<PathBuf>,

        /// Replace an existing state
        #[arg(long)]
        force: bool,
    },

    /// Read persisted oracle state
    Inspect {
        /// Data directory, overrides the configuration file
        #[arg(short, long)]
        datadir: Option<PathBuf>,

        #[command(subcommand)]
        command: InspectCommands,
    },

    /// Run an in-process session: deposit, request, stream, finalize, withdraw
    Simulate {
        /// Path to genesis file, defaults to the built-in testnet preset
        #[arg(short, long)]
        genesis: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    WriteConfig {
        /// Output path
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum InspectCommands {
    /// List registered models and their format pairs
    Models,

    /// Show one request as JSON
    Request {
        /// Request id
        id: u64,
    },

    /// Show the escrow account of an address
    Balance {
        /// Account address
        address: Address,
    },

    /// List role members
    Roles,

    /// Show accrued fees
    Fees,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging
    let level = cli.log_level.clone().unwrap_or_else(|| config.log.level.clone());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&level));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("{}", client_version());

    match cli.command {
        Commands::Init { genesis, datadir, force } => {
            let datadir = datadir.unwrap_or_else(|| config.storage.datadir.clone());
            info!("Data directory: {}", datadir.display());
            init_state(&config, &datadir, genesis.as_deref(), force)?;
        }

        Commands::Inspect { datadir, command } => {
            let datadir = datadir.unwrap_or_else(|| config.storage.datadir.clone());
            inspect(&config, &datadir, command)?;
        }

        Commands::Simulate { genesis } => {
            let genesis = load_genesis(genesis.as_deref())?;
            run_simulation(&config, &genesis)?;
        }

        Commands::WriteConfig { output } => {
            config.to_file(&output)?;
            info!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn load_genesis(path: Option<&Path>) -> Result<Genesis> {
    match path {
        Some(path) => {
            info!("Loading genesis from {}", path.display());
            Genesis::from_file(path)
        }
        None => {
            info!("Using built-in testnet genesis");
            Ok(Genesis::testnet())
        }
    }
}

fn init_state(config: &Config, datadir: &Path, genesis: Option<&Path>, force: bool) -> Result<()> {
    let genesis = load_genesis(genesis)?;
    let store = StateStore::open(config.storage.backend, datadir)?;

    if !force && OracleState::load(store.db())?.is_some() {
        anyhow::bail!(
            "Oracle state already exists in {}; pass --force to replace it",
            datadir.display()
        );
    }

    let engine = genesis.build_engine(config.oracle.address, genesis.build_token()?)?;
    engine.save(store.db())?;
    store.commit()?;

    info!(
        oracle = %config.oracle.address,
        models = engine.state().registry.len(),
        "Oracle state initialized"
    );
    Ok(())
}

fn inspect(config: &Config, datadir: &Path, command: InspectCommands) -> Result<()> {
    let store = StateStore::open(config.storage.backend, datadir)?;
    let state = OracleState::load(store.db())?.with_context(|| {
        format!("No oracle state in {}; run `aioracle init` first", datadir.display())
    })?;

    match command {
        InspectCommands::Models => {
            for (model, support) in state.registry.models() {
                let pairs: Vec<String> = support.pairs().map(|p| p.to_string()).collect();
                println!("{}: {}", model, pairs.join(", "));
            }
        }

        InspectCommands::Request { id } => {
            let request = state.requests.get(RequestId::new(id))?;
            println!("{}", serde_json::to_string_pretty(request)?);
        }

        InspectCommands::Balance { address } => {
            let account = state.escrow.account(&address);
            println!("balance:   {} AIT", format_units(account.balance, DEFAULT_DECIMALS));
            println!("reserved:  {} AIT", format_units(account.reserved, DEFAULT_DECIMALS));
            println!("available: {} AIT", format_units(account.available(), DEFAULT_DECIMALS));
        }

        InspectCommands::Roles => {
            for role in Role::ALL {
                for account in state.access.members(role) {
                    println!("{} {}", role, account);
                }
            }
        }

        InspectCommands::Fees => {
            println!("{} AIT", format_units(state.accrued_fees, DEFAULT_DECIMALS));
        }
    }

    Ok(())
}

fn run_simulation(config: &Config, genesis: &Genesis) -> Result<()> {
    let registry = Registry::new();
    let metrics = if config.metrics.enabled {
        Some(Arc::new(OracleMetrics::new(&registry)?))
    } else {
        None
    };

    let report = simulation::run(genesis, config, metrics)?;
    for event in &report.events {
        info!(?event, "Oracle event");
    }
    info!(
        request_id = %report.request_id,
        requester = %report.requester,
        segments = report.segments.len(),
        consumed = %format_units(report.token_consumed, DEFAULT_DECIMALS),
        callback = ?report.callback,
        "Simulation report"
    );

    if config.metrics.enabled && config.metrics.dump_on_exit {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        println!("{}", String::from_utf8(buffer)?);
    }

    Ok(())
}
