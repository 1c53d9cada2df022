use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::MarketError;
use crate::http::error_body;

/// USD price and market cap for one coin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoinQuote {
    pub price_usd: f64,
    pub market_cap_usd: f64,
}

impl CoinQuote {
    /// Pull the USD figures out of a `/coins/{id}` response
    pub fn from_coin(coin: &Value) -> Result<Self, MarketError> {
        let usd = |pointer: &str| {
            coin.pointer(pointer)
                .and_then(Value::as_f64)
                .ok_or_else(|| MarketError::MissingField(pointer.to_string()))
        };
        Ok(Self {
            price_usd: usd("/market_data/current_price/usd")?,
            market_cap_usd: usd("/market_data/market_cap/usd")?,
        })
    }
}

pub struct CoinGeckoClient {
    client: Client,
    base: String,
}

impl CoinGeckoClient {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn quote(&self, coin_id: &str) -> Result<CoinQuote, MarketError> {
        let response = self
            .client
            .get(format!("{}/coins/{}", self.base, coin_id))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Api {
                source_name: "coingecko",
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        let coin: Value = response.json().await?;
        let quote = CoinQuote::from_coin(&coin)?;
        debug!("{} quote: {:?}", coin_id, quote);
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_from_coin() {
        let coin = json!({
            "id": "badger-dao",
            "market_data": {
                "current_price": { "usd": 24.12, "btc": 0.0004 },
                "market_cap": { "usd": 312_000_000 }
            }
        });
        let quote = CoinQuote::from_coin(&coin).unwrap();
        assert_eq!(quote.price_usd, 24.12);
        assert_eq!(quote.market_cap_usd, 312_000_000.0);
    }

    #[test]
    fn test_quote_missing_market_cap() {
        let coin = json!({ "market_data": { "current_price": { "usd": 1.0 } } });
        match CoinQuote::from_coin(&coin) {
            Err(MarketError::MissingField(field)) => {
                assert_eq!(field, "/market_data/market_cap/usd")
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }
}
