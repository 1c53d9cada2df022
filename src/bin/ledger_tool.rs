//! Offline SourceCred ledger maintenance.
//!
//! Works on a local copy of `ledger.json`: bulk-activate every chat alias,
//! look up the ledger identity for a platform id, or mint record ids.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};

use badger_bots::ledger::{clean_id, content_version, plan_bulk, LedgerSnapshot};

#[derive(Parser)]
#[command(name = "badger-ledger")]
#[command(about = "SourceCred ledger maintenance for the registration relay")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Alias platform to match, third field of the alias address
    #[arg(long, default_value = "discord")]
    platform: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Append an activation for every platform alias not yet active
    ActivateAll {
        /// Ledger file to read
        #[arg(short, long)]
        ledger: PathBuf,

        /// File of alias descriptions to skip, one per line
        #[arg(short, long)]
        exclude: Option<PathBuf>,

        /// Where to write the updated ledger
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the ledger identity bound to a platform id
    Lookup {
        #[arg(short, long)]
        ledger: PathBuf,

        identity: String,
    },

    /// Print freshly generated record ids
    CleanId {
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        Commands::ActivateAll {
            ledger,
            exclude,
            output,
        } => activate_all(&ledger, exclude.as_deref(), &output, &cli.platform),
        Commands::Lookup { ledger, identity } => {
            let snapshot = load_snapshot(&ledger)?;
            match snapshot.find_identity(&identity, &cli.platform) {
                Some(identity_id) => {
                    println!("{}", identity_id);
                    Ok(())
                }
                None => Err(eyre!(
                    "No {} alias for {} in {}",
                    cli.platform,
                    identity,
                    ledger.display()
                )),
            }
        }
        Commands::CleanId { count } => {
            for _ in 0..count {
                println!("{}", clean_id::generate());
            }
            Ok(())
        }
    }
}

fn load_snapshot(path: &Path) -> Result<LedgerSnapshot> {
    let document = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ledger: {}", path.display()))?;
    LedgerSnapshot::parse(content_version(&document), &document)
        .with_context(|| format!("Failed to parse ledger: {}", path.display()))
}

fn load_exclusions(path: Option<&Path>) -> Result<HashSet<String>> {
    let Some(path) = path else {
        return Ok(HashSet::new());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read exclusion list: {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn activate_all(ledger: &Path, exclude: Option<&Path>, output: &Path, platform: &str) -> Result<()> {
    let snapshot = load_snapshot(ledger)?;
    let excluded = load_exclusions(exclude)?;
    log::info!(
        "Loaded {} entries from {}, {} exclusions",
        snapshot.len(),
        ledger.display(),
        excluded.len()
    );

    let bulk = plan_bulk(&snapshot, platform, &excluded, Utc::now().timestamp_millis());
    log::info!(
        "Activating {} identities ({} excluded aliases, {} already active)",
        bulk.records.len(),
        bulk.excluded.len(),
        bulk.already_active.len()
    );

    fs::write(output, snapshot.render_with(&bulk.records))
        .with_context(|| format!("Failed to write ledger: {}", output.display()))?;
    println!("Wrote {} activations to {}", bulk.records.len(), output.display());
    Ok(())
}
