use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level bot deployment configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationConfig>,
    #[serde(default)]
    pub price_bots: Vec<PriceBotConfig>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.state_dir.as_os_str().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "state_dir cannot be empty".to_string(),
            ));
        }

        if self.http.timeout.is_zero() {
            return Err(ValidationError::InvalidGeneral(
                "http.timeout must be greater than zero".to_string(),
            ));
        }

        if let Some(registration) = &self.registration {
            registration.validate()?;
        }

        let mut names = HashSet::new();
        for bot in &self.price_bots {
            bot.validate()?;
            if !names.insert(bot.common().name.as_str()) {
                return Err(ValidationError::InvalidPriceBot(format!(
                    "duplicate price bot name '{}'",
                    bot.common().name
                )));
            }
        }

        if self.registration.is_none() && self.price_bots.is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "configuration enables neither registration nor any price bot".to_string(),
            ));
        }

        Ok(())
    }
}

/// Shared general configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Directory holding file-backed queues, tables and ledgers.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Optional `.env` file loaded before secrets are resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
    /// Log outbound chat traffic instead of calling the chat API.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            state_dir: default_state_dir(),
            env_file: None,
            dry_run: false,
        }
    }
}

/// Outbound HTTP client settings shared by every adapter
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiscordConfig {
    #[serde(default = "default_discord_api")]
    pub api_base: String,
    /// Environment variable holding the monitoring webhook URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_webhook_env: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_discord_api(),
            monitoring_webhook_env: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MarketConfig {
    #[serde(default = "default_coingecko_api")]
    pub coingecko_base: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            coingecko_base: default_coingecko_api(),
        }
    }
}

/// Where the queue and table keep their data
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local, lost on restart
    Memory,
    /// JSON documents under `general.state_dir`
    #[default]
    File,
}

/// Registration relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistrationConfig {
    /// Environment variable holding the bot token.
    pub token_env: String,
    /// The bot's own user id; messages from it are ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
    #[serde(default = "default_drain_interval", with = "humantime_serde")]
    pub drain_interval: Duration,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_platform_tag")]
    pub platform_tag: String,
    /// Route `!kudos` to the registration handler.
    #[serde(default)]
    pub kudos_registers: bool,
    /// DM submitters whose identity has no ledger alias yet.
    #[serde(default = "default_true")]
    pub notify_pending: bool,
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub ledger: LedgerConfig,
}

impl RegistrationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.token_env.trim().is_empty() {
            return Err(ValidationError::InvalidRegistration(
                "token_env cannot be empty".to_string(),
            ));
        }
        if self.drain_interval.is_zero() {
            return Err(ValidationError::InvalidRegistration(
                "drain_interval must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidRegistration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.queue_name.is_empty() || self.table_name.is_empty() {
            return Err(ValidationError::InvalidRegistration(
                "queue_name and table_name cannot be empty".to_string(),
            ));
        }
        if self.platform_tag.is_empty() {
            return Err(ValidationError::InvalidRegistration(
                "platform_tag cannot be empty".to_string(),
            ));
        }
        self.ledger.validate()
    }
}

/// Where inbound chat messages come from
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayConfig {
    /// One JSON message per stdin line
    #[default]
    Console,
    /// `POST /events` with a JSON message body
    Http {
        bind: SocketAddr,
        /// Environment variable holding the shared secret callers must send.
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_env: Option<String>,
    },
}

/// Remote ledger location
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum LedgerConfig {
    Github {
        /// `owner/name`
        repo: String,
        #[serde(default = "default_ledger_path")]
        path: String,
        #[serde(default = "default_branch")]
        branch: String,
        token_env: String,
        #[serde(default = "default_github_api")]
        api_base: String,
    },
    File {
        path: PathBuf,
    },
}

impl LedgerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            LedgerConfig::Github {
                repo,
                path,
                branch,
                token_env,
                ..
            } => {
                let mut parts = repo.split('/');
                let well_formed = matches!(
                    (parts.next(), parts.next(), parts.next()),
                    (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
                );
                if !well_formed {
                    return Err(ValidationError::InvalidLedger(format!(
                        "repo must look like 'owner/name', got '{}'",
                        repo
                    )));
                }
                if path.is_empty() || branch.is_empty() || token_env.is_empty() {
                    return Err(ValidationError::InvalidLedger(
                        "path, branch and token_env cannot be empty".to_string(),
                    ));
                }
            }
            LedgerConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::InvalidLedger(
                        "ledger file path cannot be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Fields every price bot carries
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PriceBotCommon {
    pub name: String,
    /// Environment variable holding this bot's token.
    pub token_env: String,
    /// Ticker shown in the nickname, e.g. "BADGER".
    pub symbol: String,
    #[serde(default = "default_update_interval", with = "humantime_serde")]
    pub update_interval: Duration,
}

/// Price bot variants
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceBotConfig {
    /// Price and market cap straight from CoinGecko
    Coingecko {
        #[serde(flatten)]
        common: PriceBotCommon,
        coingecko_id: String,
    },
    /// Rebasing token priced through Uniswap pairs and on-chain supply
    Digg {
        #[serde(flatten)]
        common: PriceBotCommon,
        rpc_url: String,
        token_address: String,
        subgraph_url: String,
        digg_wbtc_pair_id: String,
        wbtc_usdc_pair_id: String,
        #[serde(default = "default_subgraph_retries")]
        subgraph_retries: u32,
    },
    /// Vault token showing assets under management and underlying ratio
    Sett {
        #[serde(flatten)]
        common: PriceBotCommon,
        coingecko_id: String,
        rpc_url: String,
        token_address: String,
        underlying_decimals: u32,
    },
}

impl PriceBotConfig {
    pub fn common(&self) -> &PriceBotCommon {
        match self {
            PriceBotConfig::Coingecko { common, .. }
            | PriceBotConfig::Digg { common, .. }
            | PriceBotConfig::Sett { common, .. } => common,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let common = self.common();
        if common.name.is_empty() || common.symbol.is_empty() || common.token_env.is_empty() {
            return Err(ValidationError::InvalidPriceBot(
                "name, symbol and token_env cannot be empty".to_string(),
            ));
        }
        if common.update_interval < Duration::from_secs(1) {
            return Err(ValidationError::InvalidPriceBot(format!(
                "update_interval for '{}' must be at least 1s",
                common.name
            )));
        }

        match self {
            PriceBotConfig::Coingecko { coingecko_id, .. } => {
                if coingecko_id.is_empty() {
                    return Err(ValidationError::InvalidPriceBot(format!(
                        "coingecko_id for '{}' cannot be empty",
                        common.name
                    )));
                }
            }
            PriceBotConfig::Digg {
                token_address,
                rpc_url,
                subgraph_url,
                ..
            } => {
                Self::validate_address(&common.name, token_address)?;
                if rpc_url.is_empty() || subgraph_url.is_empty() {
                    return Err(ValidationError::InvalidPriceBot(format!(
                        "rpc_url and subgraph_url for '{}' cannot be empty",
                        common.name
                    )));
                }
            }
            PriceBotConfig::Sett {
                token_address,
                rpc_url,
                coingecko_id,
                ..
            } => {
                Self::validate_address(&common.name, token_address)?;
                if rpc_url.is_empty() || coingecko_id.is_empty() {
                    return Err(ValidationError::InvalidPriceBot(format!(
                        "rpc_url and coingecko_id for '{}' cannot be empty",
                        common.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_address(name: &str, address: &str) -> Result<(), ValidationError> {
        let hex_part = address.strip_prefix("0x").unwrap_or("");
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidPriceBot(format!(
                "token_address for '{}' is not a 20-byte hex address: {}",
                name, address
            )));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid registration configuration: {0}")]
    InvalidRegistration(String),
    #[error("Invalid ledger configuration: {0}")]
    InvalidLedger(String),
    #[error("Invalid price bot configuration: {0}")]
    InvalidPriceBot(String),
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("badger-bots/{}", env!("CARGO_PKG_VERSION"))
}

fn default_discord_api() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_coingecko_api() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_drain_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_batch_size() -> usize {
    10
}

fn default_queue_name() -> String {
    "sourcecred-registration-requests".to_string()
}

fn default_table_name() -> String {
    "sourcecred-registration".to_string()
}

fn default_platform_tag() -> String {
    "discord".to_string()
}

fn default_ledger_path() -> String {
    "data/ledger.json".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_update_interval() -> Duration {
    Duration::from_secs(45)
}

fn default_subgraph_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_YAML: &str = r#"
general:
  log_level: debug
  state_dir: /tmp/badger-state
registration:
  token_env: BOT_TOKEN_GENERAL
  drain_interval: 30m
  ledger:
    backend: github
    repo: btcookies/SourceCred
    token_env: BADGER_SOURCECRED_PAT_PROD
price_bots:
  - kind: coingecko
    name: badger
    token_env: BOT_TOKEN_BADGER
    symbol: BADGER
    coingecko_id: badger-dao
  - kind: digg
    name: digg
    token_env: BOT_TOKEN_DIGG
    symbol: DIGG
    update_interval: 1m
    rpc_url: https://mainnet.example/rpc
    token_address: "0x798D1bE841a82a273720CE31c822C61a67a601C3"
    subgraph_url: https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v2
    digg_wbtc_pair_id: "0xe86204c4eddd2f70ee00ead6805f917671f56c52"
    wbtc_usdc_pair_id: "0x004375dff511095cc5a197a54140a24efef3a416"
"#;

    #[test]
    fn test_full_config_parsing() {
        let config: Config = serde_yaml::from_str(FULL_YAML).unwrap();
        assert!(config.validate().is_ok());

        let registration = config.registration.as_ref().unwrap();
        assert_eq!(registration.drain_interval, Duration::from_secs(1800));
        assert_eq!(registration.batch_size, 10);
        assert_eq!(registration.platform_tag, "discord");
        assert_eq!(registration.storage, StorageBackend::File);
        assert!(!registration.kudos_registers);
        assert!(registration.notify_pending);
        assert_eq!(registration.gateway, GatewayConfig::Console);
        match &registration.ledger {
            LedgerConfig::Github { path, branch, .. } => {
                assert_eq!(path, "data/ledger.json");
                assert_eq!(branch, "master");
            }
            other => panic!("expected github ledger, got {:?}", other),
        }

        assert_eq!(config.price_bots.len(), 2);
        assert_eq!(config.price_bots[0].common().update_interval, Duration::from_secs(45));
        assert_eq!(config.price_bots[1].common().update_interval, Duration::from_secs(60));
        assert!(matches!(
            &config.price_bots[1],
            PriceBotConfig::Digg { subgraph_retries: 3, .. }
        ));
    }

    #[test]
    fn test_http_gateway_parsing() {
        let yaml = r#"
registration:
  token_env: BOT_TOKEN_GENERAL
  gateway:
    kind: http
    bind: 127.0.0.1:8088
    secret_env: RELAY_SECRET
  ledger:
    backend: file
    path: ledger.json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        match &config.registration.unwrap().gateway {
            GatewayConfig::Http { bind, secret_env } => {
                assert_eq!(bind.port(), 8088);
                assert_eq!(secret_env.as_deref(), Some("RELAY_SECRET"));
            }
            other => panic!("expected http gateway, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_config_rejected() {
        let config: Config = serde_yaml::from_str("general: {}").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("neither registration"));
    }

    #[test]
    fn test_bad_repo_rejected() {
        let yaml = r#"
registration:
  token_env: BOT_TOKEN_GENERAL
  ledger:
    backend: github
    repo: not-a-repo
    token_env: PAT
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidLedger(_))));
    }

    #[test]
    fn test_duplicate_bot_names_rejected() {
        let yaml = r#"
price_bots:
  - kind: coingecko
    name: badger
    token_env: A
    symbol: BADGER
    coingecko_id: badger-dao
  - kind: coingecko
    name: badger
    token_env: B
    symbol: BBADGER
    coingecko_id: badger-sett-badger
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_bad_token_address_rejected() {
        let yaml = r#"
price_bots:
  - kind: sett
    name: bbadger
    token_env: A
    symbol: BBADGER
    coingecko_id: badger-sett-badger
    rpc_url: https://mainnet.example/rpc
    token_address: "0x1234"
    underlying_decimals: 18
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPriceBot(_))));
    }

    #[test]
    fn test_zero_drain_interval_rejected() {
        let yaml = r#"
registration:
  token_env: BOT_TOKEN_GENERAL
  drain_interval: 0s
  ledger:
    backend: file
    path: ledger.json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidRegistration(_))
        ));
    }
}
