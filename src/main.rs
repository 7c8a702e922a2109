use agentrep::application::dispatcher::ShardedDispatcher;
use agentrep::application::engine::{EngineConfig, ReputationEngine};
use agentrep::domain::ports::{AgentStoreRef, TransactionStoreRef};
use agentrep::domain::score::ScoreParams;
use agentrep::infrastructure::in_memory::{InMemoryAgentStore, InMemoryTransactionStore};
use agentrep::interfaces::csv::event_reader::EventReader;
use agentrep::interfaces::csv::report_writer::ReportWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input transaction events CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Number of dispatcher workers (per-seller ordering is preserved)
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Reputation half-life in days
    #[arg(long, value_parser = parse_half_life)]
    half_life_days: Option<f64>,
}

/// A zero half-life divides to infinity in the decay exponent and a negative
/// one amplifies deviation instead of decaying it, so both are rejected.
fn parse_half_life(value: &str) -> Result<f64, String> {
    let days: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if days > 0.0 {
        Ok(days)
    } else {
        Err("half-life must be greater than zero".to_string())
    }
}

fn build_stores(db_path: Option<PathBuf>) -> Result<(AgentStoreRef, TransactionStoreRef)> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store =
                agentrep::infrastructure::rocksdb::RocksDbStore::open(path).into_diagnostic()?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok((
                Arc::new(InMemoryAgentStore::new()),
                Arc::new(InMemoryTransactionStore::new()),
            ))
        }
        None => Ok((
            Arc::new(InMemoryAgentStore::new()),
            Arc::new(InMemoryTransactionStore::new()),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout stays a clean report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let (agent_store, transaction_store) = build_stores(cli.db_path)?;

    let mut config = EngineConfig::default();
    if let Some(half_life_days) = cli.half_life_days {
        config.params = ScoreParams {
            half_life_days,
            ..config.params
        };
    }

    let engine = Arc::new(ReputationEngine::new(agent_store, transaction_store).with_config(config));
    let dispatcher = ShardedDispatcher::new(engine.clone(), cli.workers);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                if let Err(e) = dispatcher.dispatch(event).await {
                    eprintln!("Error dispatching transaction: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading transaction: {}", e);
            }
        }
    }

    dispatcher.shutdown().await.into_diagnostic()?;

    let agents = engine.results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_agents(agents).into_diagnostic()?;

    Ok(())
}
