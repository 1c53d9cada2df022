//! DIGG, priced in BTC on Uniswap and converted through the WBTC/USDC pair.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::price::{BotDisplay, PriceSource};
use crate::market::{number_label, round_to, MarketError, RpcClient, SubgraphClient};

/// Pause between subgraph attempts while the DIGG/WBTC pair is missing
const RETRY_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiggQuote {
    pub price_btc: f64,
    pub price_usd: f64,
    pub market_cap_usd: f64,
}

impl DiggQuote {
    pub fn new(price_btc: f64, btc_usd: f64, supply: f64) -> Self {
        let price_usd = price_btc * btc_usd;
        Self {
            price_btc,
            price_usd,
            market_cap_usd: price_usd * supply,
        }
    }
}

pub fn digg_display(symbol: &str, quote: &DiggQuote) -> BotDisplay {
    BotDisplay {
        activity: format!(
            "mcap=${} btc={}",
            number_label(quote.market_cap_usd),
            round_to(quote.price_btc, 2)
        ),
        nickname: format!("{} ${}", symbol, quote.price_usd.round() as i64),
    }
}

pub struct DiggSource {
    pub(crate) subgraph: SubgraphClient,
    pub(crate) rpc: RpcClient,
    pub(crate) token_address: String,
    pub(crate) digg_wbtc_pair_id: String,
    pub(crate) wbtc_usdc_pair_id: String,
    pub(crate) retries: u32,
    pub(crate) symbol: String,
}

impl DiggSource {
    pub async fn quote(&self) -> Result<DiggQuote, MarketError> {
        let price_btc = self
            .subgraph
            .pair_with_retry(&self.digg_wbtc_pair_id, self.retries, RETRY_PAUSE)
            .await?
            .token0_price;
        let btc_usd = self
            .subgraph
            .pair(&self.wbtc_usdc_pair_id)
            .await?
            .ok_or_else(|| MarketError::PairNotFound(self.wbtc_usdc_pair_id.clone()))?
            .token1_price;
        let supply = self.rpc.token_supply(&self.token_address).await?;

        let quote = DiggQuote::new(price_btc, btc_usd, supply);
        debug!("digg quote: {:?}", quote);
        Ok(quote)
    }
}

#[async_trait]
impl PriceSource for DiggSource {
    async fn fetch(&self) -> Result<BotDisplay, MarketError> {
        Ok(digg_display(&self.symbol, &self.quote().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digg_display() {
        let quote = DiggQuote::new(1.0514, 40_000.0, 1_500.0);
        assert_eq!(quote.price_usd, 1.0514 * 40_000.0);
        let display = digg_display("DIGG", &quote);
        assert_eq!(display.activity, "mcap=$63M btc=1.05");
        assert_eq!(display.nickname, "DIGG $42056");
    }

    #[test]
    fn test_digg_display_small_supply() {
        let display = digg_display("DIGG", &DiggQuote::new(0.5, 1_000.0, 1.0));
        assert_eq!(display.activity, "mcap=$500 btc=0.5");
        assert_eq!(display.nickname, "DIGG $500");
    }
}
