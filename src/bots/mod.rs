//! Long-running bots and the wiring that builds them from configuration.
//!
//! - [`price`]: the shared price bot loop and the CoinGecko source
//! - [`digg`]: DIGG priced through Uniswap pairs
//! - [`sett`]: vault tokens with AUM and underlying ratio
//! - [`registration`]: intake event loop plus the drain timer

pub mod digg;
pub mod price;
pub mod registration;
pub mod sett;

use std::sync::Arc;

use color_eyre::Result;
use log::info;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::chat::{
    spawn_console_gateway, spawn_http_gateway, ChatClient, DiscordRestClient, LogChat,
    MonitoringWebhook,
};
use crate::config::{Config, GatewayConfig, PriceBotConfig, RegistrationConfig};
use crate::config_loader::resolve_secret;
use crate::ledger::{open_ledger_store, LedgerActivator, LedgerStore};
use crate::market::{CoinGeckoClient, RpcClient, SubgraphClient};
use crate::platform::{open_registration_storage, RegistrationQueue, RegistrationTable};
use crate::registration::{DrainOptions, DrainWorker, Intake, IntakeOptions};

pub use digg::DiggSource;
pub use price::{BotDisplay, CoinGeckoSource, PriceBot, PriceSource};
pub use registration::RegistrationBot;
pub use sett::SettSource;

/// Capacity of the inbound chat event channel
const EVENT_BUFFER: usize = 64;

/// A chat client for one bot token, or a logging stand-in on dry runs
pub fn chat_client(
    config: &Config,
    name: &str,
    token_env: &str,
    client: &Client,
) -> Result<Arc<dyn ChatClient>> {
    if config.general.dry_run {
        return Ok(Arc::new(LogChat::new(name)));
    }
    Ok(Arc::new(DiscordRestClient::new(
        client.clone(),
        config.discord.api_base.as_str(),
        resolve_secret(token_env)?,
    )))
}

pub fn monitoring_webhook(config: &Config, client: &Client) -> Result<Option<Arc<MonitoringWebhook>>> {
    match &config.discord.monitoring_webhook_env {
        Some(env) if !config.general.dry_run => Ok(Some(Arc::new(MonitoringWebhook::new(
            client.clone(),
            resolve_secret(env)?,
        )))),
        _ => Ok(None),
    }
}

pub fn build_price_bot(
    config: &Config,
    bot: &PriceBotConfig,
    client: &Client,
    monitor: Option<Arc<MonitoringWebhook>>,
) -> Result<PriceBot> {
    let common = bot.common();
    let coingecko = || CoinGeckoClient::new(client.clone(), config.market.coingecko_base.as_str());

    let source: Box<dyn PriceSource> = match bot {
        PriceBotConfig::Coingecko { coingecko_id, .. } => Box::new(CoinGeckoSource::new(
            coingecko(),
            coingecko_id.as_str(),
            common.symbol.as_str(),
        )),
        PriceBotConfig::Digg {
            rpc_url,
            token_address,
            subgraph_url,
            digg_wbtc_pair_id,
            wbtc_usdc_pair_id,
            subgraph_retries,
            ..
        } => Box::new(DiggSource {
            subgraph: SubgraphClient::new(client.clone(), subgraph_url.as_str()),
            rpc: RpcClient::new(client.clone(), rpc_url.as_str()),
            token_address: token_address.clone(),
            digg_wbtc_pair_id: digg_wbtc_pair_id.clone(),
            wbtc_usdc_pair_id: wbtc_usdc_pair_id.clone(),
            retries: *subgraph_retries,
            symbol: common.symbol.clone(),
        }),
        PriceBotConfig::Sett {
            coingecko_id,
            rpc_url,
            token_address,
            underlying_decimals,
            ..
        } => Box::new(SettSource {
            coingecko: coingecko(),
            coingecko_id: coingecko_id.clone(),
            rpc: RpcClient::new(client.clone(), rpc_url.as_str()),
            token_address: token_address.clone(),
            underlying_decimals: *underlying_decimals,
            symbol: common.symbol.clone(),
        }),
    };

    let chat = chat_client(config, &common.name, &common.token_env, client)?;
    let bot = PriceBot::new(
        common.name.as_str(),
        common.symbol.as_str(),
        chat,
        source,
        common.update_interval,
    );
    Ok(match monitor {
        Some(monitor) => bot.with_monitor(monitor),
        None => bot,
    })
}

/// Everything the registration relay talks to
pub struct RegistrationServices {
    pub queue: Arc<dyn RegistrationQueue>,
    pub table: Arc<dyn RegistrationTable>,
    pub ledger: Arc<dyn LedgerStore>,
    pub chat: Arc<dyn ChatClient>,
}

impl RegistrationServices {
    pub async fn open(config: &Config, registration: &RegistrationConfig, client: &Client) -> Result<Self> {
        let (queue, table) =
            open_registration_storage(registration, &config.general.state_dir).await?;
        let ledger = open_ledger_store(&registration.ledger, client.clone())?;
        let chat = chat_client(config, "registration", &registration.token_env, client)?;
        info!("Registration ledger: {}", ledger.describe());
        Ok(Self {
            queue,
            table,
            ledger,
            chat,
        })
    }

    pub fn drain_worker(&self, registration: &RegistrationConfig) -> DrainWorker {
        let activator = LedgerActivator::new(Arc::clone(&self.ledger), registration.platform_tag.as_str());
        DrainWorker::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.table),
            activator,
            DrainOptions {
                batch_size: registration.batch_size,
                notify_pending: registration.notify_pending,
            },
        )
        .with_chat(Arc::clone(&self.chat))
    }

    pub fn intake(&self, registration: &RegistrationConfig) -> Intake {
        Intake::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.table),
            Arc::clone(&self.chat),
            IntakeOptions {
                bot_user_id: registration.bot_user_id.clone(),
                kudos_registers: registration.kudos_registers,
            },
        )
    }
}

/// Start every configured bot; each task stops when `shutdown` flips
pub async fn spawn_all(
    config: &Config,
    client: &Client,
    shutdown: &watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();

    let monitor = monitoring_webhook(config, client)?;
    for bot_config in &config.price_bots {
        let bot = build_price_bot(config, bot_config, client, monitor.clone())?;
        info!("Starting price bot {}", bot.name());
        handles.push(tokio::spawn(bot.run(shutdown.clone())));
    }

    if let Some(registration) = &config.registration {
        let services = RegistrationServices::open(config, registration, client).await?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        match &registration.gateway {
            GatewayConfig::Console => {
                handles.push(spawn_console_gateway(events_tx, shutdown.clone()));
            }
            GatewayConfig::Http { bind, secret_env } => {
                let secret = secret_env.as_deref().map(resolve_secret).transpose()?;
                handles.push(spawn_http_gateway(*bind, events_tx, secret, shutdown.clone()));
            }
        }

        let bot = RegistrationBot::new(
            services.intake(registration),
            Arc::new(services.drain_worker(registration)),
            registration.drain_interval,
        );
        handles.push(tokio::spawn(bot.run(events_rx, shutdown.clone())));
    }

    Ok(handles)
}
