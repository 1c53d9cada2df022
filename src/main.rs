use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;
use tokio::sync::watch;

use badger_bots::bots::{self, RegistrationServices};
use badger_bots::config::{Config, GatewayConfig, LedgerConfig};
use badger_bots::config_loader;
use badger_bots::http::build_client;

/// Price display bots and SourceCred registration relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the bot configuration YAML file
    #[arg(short, long, default_value = "bots.yaml")]
    config: PathBuf,

    /// Override general.log_level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every configured bot until interrupted
    Run,
    /// Run a single registration drain cycle and exit
    Drain,
    /// Validate the configuration and report missing secrets
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config = config_loader::load_config(&args.config)?;
    let level = args
        .log_level
        .clone()
        .or_else(|| config.general.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("Configuration file: {:?}", args.config);
    config_loader::load_env_file(&config, &args.config)?;

    match args.command {
        Command::Run => run(&config).await,
        Command::Drain => drain(&config).await,
        Command::Check => check(&config),
    }
}

async fn run(config: &Config) -> Result<()> {
    let client = build_client(&config.http).wrap_err("Failed to build HTTP client")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = bots::spawn_all(config, &client, &shutdown_rx).await?;
    info!("Started {} tasks", handles.len());

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for ctrl-c")?;
    info!("Shutting down");
    shutdown_tx.send(true).ok();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Task ended abnormally: {}", e);
        }
    }
    Ok(())
}

async fn drain(config: &Config) -> Result<()> {
    let Some(registration) = &config.registration else {
        return Err(color_eyre::eyre::eyre!(
            "Configuration has no registration section"
        ));
    };
    let client = build_client(&config.http).wrap_err("Failed to build HTTP client")?;
    let services = RegistrationServices::open(config, registration, &client).await?;

    match services.drain_worker(registration).run_cycle().await {
        Ok(report) => {
            info!("Drain report: {:?}", report);
            Ok(())
        }
        Err(e) => {
            error!("Drain cycle failed: {}", e);
            Err(e.into())
        }
    }
}

fn check(config: &Config) -> Result<()> {
    let mut secrets: Vec<&str> = Vec::new();
    if let Some(registration) = &config.registration {
        secrets.push(&registration.token_env);
        if let LedgerConfig::Github { token_env, .. } = &registration.ledger {
            secrets.push(token_env);
        }
        if let GatewayConfig::Http {
            secret_env: Some(env),
            ..
        } = &registration.gateway
        {
            secrets.push(env);
        }
    }
    for bot in &config.price_bots {
        secrets.push(&bot.common().token_env);
    }
    if let Some(env) = &config.discord.monitoring_webhook_env {
        secrets.push(env);
    }

    let missing: Vec<&str> = secrets
        .into_iter()
        .filter(|env| config_loader::resolve_secret(env).is_err())
        .collect();

    info!(
        "Configuration OK: registration {}, {} price bots",
        if config.registration.is_some() { "enabled" } else { "disabled" },
        config.price_bots.len()
    );
    if missing.is_empty() {
        info!("All secrets are set");
        return Ok(());
    }
    for env in &missing {
        warn!("Secret {} is not set", env);
    }
    if config.general.dry_run {
        info!("dry_run is set, chat tokens are not required");
        return Ok(());
    }
    Err(color_eyre::eyre::eyre!(
        "{} secret(s) missing: {}",
        missing.len(),
        missing.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["badger-bots", "--config", "test.yaml", "run"]);
        assert_eq!(args.config, PathBuf::from("test.yaml"));
        assert!(matches!(args.command, Command::Run));
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn test_default_config_and_override() {
        let args = Args::parse_from(["badger-bots", "--log-level", "debug", "drain"]);
        assert_eq!(args.config, PathBuf::from("bots.yaml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(matches!(args.command, Command::Drain));
    }
}
