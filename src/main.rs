use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wallet_ledger::application::engine::LedgerEngine;
use wallet_ledger::application::feed::FeedEvent;
use wallet_ledger::config::WalletConfig;
use wallet_ledger::domain::payment_method::PaymentMethodRegistry;
use wallet_ledger::domain::ports::LedgerStoreRef;
use wallet_ledger::infrastructure::in_memory::InMemoryLedgerStore;
#[cfg(feature = "storage-rocksdb")]
use wallet_ledger::infrastructure::rocksdb::RocksDBStore;
use wallet_ledger::infrastructure::simulated_gateway::SimulatedGateway;
use wallet_ledger::interfaces::csv::account_writer::AccountWriter;
use wallet_ledger::interfaces::csv::method_writer::MethodWriter;
use wallet_ledger::interfaces::csv::operation_reader::OperationReader;
use wallet_ledger::interfaces::csv::replay;
use wallet_ledger::interfaces::csv::transaction_writer::TransactionWriter;

#[derive(Parser)]
#[command(name = "wallet", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an operations CSV and print the final balances
    Run(RunArgs),
    /// List the active payment methods
    Methods,
}

#[derive(Args)]
struct RunArgs {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the simulated gateway, overriding the config file
    #[arg(long)]
    seed: Option<u64>,

    /// Also print this account's history after the balances
    #[arg(long)]
    history: Option<String>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>, capacity: usize) -> Result<LedgerStoreRef> {
    match db_path {
        Some(path) => {
            let store = RocksDBStore::open_with_event_capacity(path, capacity).into_diagnostic()?;
            info!(path = %path.display(), "using persistent storage");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::with_event_capacity(capacity))),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>, capacity: usize) -> Result<LedgerStoreRef> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Arc::new(InMemoryLedgerStore::with_event_capacity(capacity)))
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => WalletConfig::load(path).into_diagnostic()?,
        None => WalletConfig::default(),
    };
    if args.seed.is_some() {
        config.gateway.seed = args.seed;
    }

    let store = open_store(args.db_path.as_deref(), config.engine.feed_buffer)?;
    let gateway = Arc::new(SimulatedGateway::new(config.gateway.clone()).into_diagnostic()?);
    let engine = LedgerEngine::new(Arc::clone(&store), gateway, config.engine.clone());

    let file = File::open(&args.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let (mut applied, mut rejected) = (0usize, 0usize);
    for (index, op_result) in reader.operations().enumerate() {
        let row = index + 1;
        match op_result {
            Ok(op) => match replay::apply(&engine, &op).await {
                Ok(_) => applied += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(row, kind = %e.kind(), "Error applying operation: {e}");
                }
            },
            Err(e) => {
                rejected += 1;
                warn!(row, "Error reading operation: {e}");
            }
        }
    }
    info!(applied, rejected, "replay finished");

    let accounts = store.accounts().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    AccountWriter::new(&mut out)
        .write_accounts(&accounts)
        .into_diagnostic()?;

    if let Some(account_id) = &args.history {
        let account = engine.account(account_id).await.into_diagnostic()?;
        let mut subscription = engine
            .feed()
            .subscribe(&account.id, account.role)
            .await
            .into_diagnostic()?;
        if let Some(event @ FeedEvent::Snapshot(_)) = subscription.next().await.into_diagnostic()? {
            writeln!(out).into_diagnostic()?;
            TransactionWriter::new(&mut out)
                .write_event(&event)
                .into_diagnostic()?;
        }
        subscription.unsubscribe();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Methods => {
            let stdout = io::stdout();
            MethodWriter::new(stdout.lock())
                .write_methods(PaymentMethodRegistry::builtin().list_active())
                .into_diagnostic()
        }
    }
}
