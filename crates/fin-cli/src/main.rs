//! fin CLI entry point.
//!
//! This file is intentionally thin: it sets up tracing, parses arguments,
//! builds the stores and services, and dispatches. All replication and
//! ledger behavior lives in the library crates.

mod remote_file;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Mutex;
use tracing::info;

use fin_backup::{export_backup, import_backup, read_backup_file, write_backup_file};
use fin_integrity::{check_referential_integrity, validate_collection, AccountSnapshot, AutoFixer};
use fin_ledger::LedgerService;
use fin_schemas::EntityKind;
use fin_store::JsonFileStore;
use fin_sync::{SyncMode, SyncService};

use crate::remote_file::FileRemoteStore;

#[derive(Parser)]
#[command(name = "fin")]
#[command(about = "Offline-first finance replica tooling", long_about = None)]
struct Cli {
    /// Path to the local replica file.
    #[arg(long, default_value = "replica.json")]
    replica: PathBuf,

    /// Account to operate on.
    #[arg(long, default_value = "default")]
    account: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run schema validation and referential-integrity checks.
    Validate {
        /// Apply auto-fixes for repairable issues.
        #[arg(long, default_value_t = false)]
        fix: bool,
    },

    /// Export the account to a backup document.
    Export {
        /// Output file.
        #[arg(long, default_value = "backup.json")]
        out: PathBuf,
    },

    /// Import a backup document, replacing all local collections.
    Import {
        /// Backup file to import.
        #[arg(long)]
        file: PathBuf,
    },

    /// Run one sync cycle against a file-backed remote.
    Sync {
        /// Path to the remote store file.
        #[arg(long)]
        remote: PathBuf,

        #[arg(long, value_enum, default_value_t = ModeArg::Bidirectional)]
        mode: ModeArg,
    },

    /// Recompute one wallet balance from its transactions and transfers.
    Recalc {
        /// Wallet id.
        #[arg(long)]
        wallet: String,
    },

    /// Remove tombstones past the retention window from both stores.
    Purge {
        /// Path to the remote store file.
        #[arg(long)]
        remote: PathBuf,

        #[arg(long, default_value_t = fin_sync::DEFAULT_TOMBSTONE_RETENTION_DAYS)]
        retention_days: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Upload,
    Download,
    Bidirectional,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Upload => SyncMode::Upload,
            ModeArg::Download => SyncMode::Download,
            ModeArg::Bidirectional => SyncMode::Bidirectional,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    let local = Arc::new(JsonFileStore::new(&cli.replica));
    let guard = Arc::new(Mutex::new(()));

    match cli.cmd {
        Commands::Validate { fix } => {
            let snapshot = AccountSnapshot::load(local.as_ref(), &cli.account).await?;
            for kind in EntityKind::DEPENDENCY_ORDER {
                let report = validate_collection(kind, snapshot.records(kind));
                if !report.is_clean() {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            let integrity = check_referential_integrity(&snapshot);
            println!("{}", serde_json::to_string_pretty(&integrity)?);
            if fix && !integrity.is_clean() {
                let fixer = AutoFixer::new(local.as_ref(), &cli.account);
                let outcome = fixer.apply(&integrity.issues, Utc::now()).await?;
                info!(fixed = outcome.fixed, skipped = outcome.skipped, "auto-fix complete");
            }
        }

        Commands::Export { out } => {
            let document = export_backup(local.as_ref(), &cli.account, Utc::now()).await?;
            write_backup_file(&out, &document)?;
            info!(path = %out.display(), "backup written");
        }

        Commands::Import { file } => {
            let document = read_backup_file(&file)?;
            let report = import_backup(local.as_ref(), &document, Utc::now()).await?;
            info!(removed = report.removed, "backup imported");
        }

        Commands::Sync { remote, mode } => {
            let remote = Arc::new(FileRemoteStore::new(&remote));
            let service = SyncService::new(local, remote, cli.account.as_str(), guard);
            let report = service
                .sync(mode.into())
                .await
                .context("sync cycle failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Recalc { wallet } => {
            let ledger = LedgerService::new(local, cli.account.as_str(), guard);
            let balance = ledger.recalculate_wallet_balance(&wallet).await?;
            println!("{wallet}: {balance}");
        }

        Commands::Purge {
            remote,
            retention_days,
        } => {
            let remote = Arc::new(FileRemoteStore::new(&remote));
            let service = SyncService::new(local, remote, cli.account.as_str(), guard);
            let cutoff = Utc::now() - chrono::Duration::days(retention_days);
            let report = service.purge_tombstones(cutoff).await?;
            info!(
                local = report.local_purged,
                remote = report.remote_purged,
                "purge complete"
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
