//! The price bot loop and the plain CoinGecko source.
//!
//! Presence (`playing <activity>`) needs a gateway session. The Discord REST
//! client reports it as unsupported, so a bot running on REST alone only
//! publishes its nickname; the activity text shows up only when the chat
//! client is backed by an external gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::chat::{ChatClient, ChatError, Embed, MonitoringWebhook};
use crate::market::{number_label, CoinGeckoClient, CoinQuote, MarketError};

/// What a price bot shows: presence activity and guild nickname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotDisplay {
    pub activity: String,
    pub nickname: String,
}

/// Produces the current display for one bot
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<BotDisplay, MarketError>;
}

pub fn coingecko_display(symbol: &str, quote: &CoinQuote) -> BotDisplay {
    BotDisplay {
        activity: format!("marketcap=${}", number_label(quote.market_cap_usd)),
        nickname: format!("{} ${}", symbol, quote.price_usd),
    }
}

pub struct CoinGeckoSource {
    client: CoinGeckoClient,
    coin_id: String,
    symbol: String,
}

impl CoinGeckoSource {
    pub fn new(client: CoinGeckoClient, coin_id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            client,
            coin_id: coin_id.into(),
            symbol: symbol.into(),
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch(&self) -> Result<BotDisplay, MarketError> {
        let quote = self.client.quote(&self.coin_id).await?;
        Ok(coingecko_display(&self.symbol, &quote))
    }
}

/// Alert posted when a nickname cannot be set
pub fn nickname_alert(symbol: &str, err: &ChatError) -> Embed {
    Embed::titled(format!("**{} Price Bot Error**", symbol))
        .description(format!("Error message: {}", err))
}

pub struct PriceBot {
    name: String,
    symbol: String,
    chat: Arc<dyn ChatClient>,
    source: Box<dyn PriceSource>,
    interval: Duration,
    monitor: Option<Arc<MonitoringWebhook>>,
}

impl PriceBot {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        chat: Arc<dyn ChatClient>,
        source: Box<dyn PriceSource>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            chat,
            source,
            interval,
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<MonitoringWebhook>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch once and publish. Chat failures are logged, not returned.
    pub async fn tick(&self) -> Result<BotDisplay, MarketError> {
        let display = self.source.fetch().await?;
        debug!("[{}] {:?}", self.name, display);
        self.publish(&display).await;
        Ok(display)
    }

    async fn publish(&self, display: &BotDisplay) {
        match self.chat.update_presence(&display.activity).await {
            Ok(()) => {}
            Err(ChatError::Unsupported(what)) => debug!("[{}] skipping {}", self.name, what),
            Err(e) => warn!("[{}] presence update failed: {}", self.name, e),
        }

        let guilds = match self.chat.own_guilds().await {
            Ok(guilds) => guilds,
            Err(e) => {
                warn!("[{}] could not list guilds: {}", self.name, e);
                return;
            }
        };
        for guild in guilds {
            if let Err(e) = self.chat.update_nickname(&guild, &display.nickname).await {
                error!("[{}] nickname update in {} failed: {}", self.name, guild, e);
                self.alert(&e).await;
            }
        }
    }

    async fn alert(&self, err: &ChatError) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        if let Err(e) = monitor.post_embed(&nickname_alert(&self.symbol, err)).await {
            warn!("[{}] monitoring alert failed: {}", self.name, e);
        }
    }

    /// Tick on the configured interval until shutdown
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("[{}] updating every {:?}", self.name, self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!("[{}] update failed: {}", self.name, e);
                    }
                }
            }
        }
        info!("[{}] stopped", self.name);
    }
}
