use crate::config::Config;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    info!(
        "Configuration enables registration: {}, price bots: {}",
        config.registration.is_some(),
        config.price_bots.len()
    );

    config.validate()?;

    Ok(config)
}

/// Load the optional `.env` file named by the configuration.
///
/// Relative paths resolve against the configuration file's directory.
/// Variables already present in the environment win.
pub fn load_env_file(config: &Config, config_path: &Path) -> Result<()> {
    let Some(env_file) = &config.general.env_file else {
        // Fall back to a .env in the working directory, as local runs expect.
        if dotenvy::dotenv().is_ok() {
            debug!("Loaded .env from working directory");
        }
        return Ok(());
    };

    let resolved = if env_file.is_relative() {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(env_file)
    } else {
        env_file.clone()
    };

    if !resolved.exists() {
        warn!("env_file {:?} does not exist, relying on process environment", resolved);
        return Ok(());
    }

    dotenvy::from_path(&resolved)
        .wrap_err_with(|| format!("Failed to load env file '{}'", resolved.display()))?;
    info!("Loaded environment from {:?}", resolved);
    Ok(())
}

/// Read a secret from the environment variable named in the configuration
pub fn resolve_secret(env_name: &str) -> Result<String> {
    match std::env::var(env_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => Err(eyre!("Environment variable {} is set but empty", env_name)),
        Err(_) => Err(eyre!("Environment variable {} is not set", env_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_registration_config() {
        let yaml = r#"
general:
  state_dir: ./state
registration:
  token_env: BOT_TOKEN_GENERAL
  ledger:
    backend: file
    path: ledger.json
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(config.registration.is_some());
        assert!(config.price_bots.is_empty());
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let yaml = r#"
registration:
  token_env: ""
  ledger:
    backend: file
    path: ledger.json
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let err = load_config(Path::new("/nonexistent/badger.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open configuration"));
    }

    #[test]
    fn test_resolve_secret() {
        std::env::set_var("BADGER_BOTS_TEST_SECRET", "  s3cret \n");
        assert_eq!(resolve_secret("BADGER_BOTS_TEST_SECRET").unwrap(), "s3cret");

        std::env::set_var("BADGER_BOTS_TEST_EMPTY", "   ");
        assert!(resolve_secret("BADGER_BOTS_TEST_EMPTY").is_err());

        assert!(resolve_secret("BADGER_BOTS_TEST_DEFINITELY_UNSET").is_err());
    }
}
