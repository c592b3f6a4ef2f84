use clap::{Parser, Subcommand};
use donation_engine::application::retry_engine::IntegrationRetryEngine;
use donation_engine::config::EngineConfig;
use donation_engine::domain::integration::{InstitutoUserData, JobId};
use donation_engine::domain::ports::{AmbassadorDirectory, IntegrationStoreBox};
use donation_engine::domain::split::compute_split;
use donation_engine::domain::wallet::validate_wallet_id;
use donation_engine::infrastructure::directory::StaticAmbassadorDirectory;
use donation_engine::infrastructure::http::HttpPartnerClient;
use donation_engine::infrastructure::in_memory::InMemoryIntegrationStore;
#[cfg(feature = "storage-rocksdb")]
use donation_engine::infrastructure::rocksdb::RocksDBStore;
use donation_engine::interfaces::csv::donation_reader::DonationReader;
use donation_engine::interfaces::csv::split_writer::SplitWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute splits for a donations CSV (`amount,ambassador_code`)
    Split { input: PathBuf },
    /// Deliver one registration JSON file to the partner API
    Submit {
        payload: PathBuf,
        #[arg(long)]
        user_id: String,
    },
    /// Attempt every due retry; repeat on an interval when given
    Sweep {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Print delivery statistics
    Stats,
    /// Cancel a scheduled retry job
    Cancel { job_id: JobId },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Split { input } => split(&config, input).await,
        command => {
            let store = open_store(cli.db_path)?;
            let partner = HttpPartnerClient::new(config.partner.clone()).into_diagnostic()?;
            let engine = IntegrationRetryEngine::new(store, Box::new(partner), config.retry.clone());
            run_integration(&engine, command).await
        }
    }
}

fn open_store(db_path: Option<PathBuf>) -> Result<IntegrationStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryIntegrationStore::new()))
        }
        None => Ok(Box::new(InMemoryIntegrationStore::new())),
    }
}

async fn split(config: &EngineConfig, input: PathBuf) -> Result<()> {
    config.split.validate().into_diagnostic()?;
    let directory = StaticAmbassadorDirectory::new(config.ambassadors.clone());
    let reserved = config.wallets.reserved_wallets();

    let file = File::open(input).into_diagnostic()?;
    let reader = DonationReader::new(file);
    let stdout = io::stdout();
    let mut writer = SplitWriter::new(stdout.lock()).into_diagnostic()?;

    for row in reader.donations() {
        let donation = match row {
            Ok(donation) => donation,
            Err(e) => {
                warn!(error = %e, "Error reading donation");
                continue;
            }
        };
        let has_ambassador = match &donation.ambassador_code {
            Some(code) => directory
                .wallet_for(code)
                .await
                .into_diagnostic()?
                .is_some_and(|wallet| validate_wallet_id(&wallet, &reserved).is_ok()),
            None => false,
        };
        match compute_split(donation.amount, has_ambassador, &config.split) {
            Ok(split) => writer.write_split(donation.amount, &split).into_diagnostic()?,
            Err(e) => warn!(amount = %donation.amount, error = %e, "Error processing donation"),
        }
    }

    writer.flush().into_diagnostic()?;
    Ok(())
}

async fn run_integration(engine: &IntegrationRetryEngine, command: Command) -> Result<()> {
    match command {
        Command::Submit { payload, user_id } => {
            let file = File::open(payload).into_diagnostic()?;
            let data: InstitutoUserData = serde_json::from_reader(file).into_diagnostic()?;
            let result = engine.submit(&user_id, &data).await.into_diagnostic()?;
            print_json(&result)
        }
        Command::Sweep { interval_secs } => {
            let Some(secs) = interval_secs else {
                let outcomes = engine.process_retries(engine.now()).await.into_diagnostic()?;
                println!("{}", outcomes.len());
                return Ok(());
            };
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.process_retries(engine.now()).await {
                            warn!(error = %e, "Retry sweep failed, retrying next tick");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Sweep loop stopped");
                        return Ok(());
                    }
                }
            }
        }
        Command::Stats => print_json(&engine.stats().await.into_diagnostic()?),
        Command::Cancel { job_id } => {
            let cancelled = engine.cancel(job_id).await.into_diagnostic()?;
            println!("{cancelled}");
            Ok(())
        }
        Command::Split { .. } => Ok(()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
