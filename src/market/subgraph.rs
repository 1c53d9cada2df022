//! Uniswap v2 subgraph pair prices.

use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::MarketError;
use crate::http::error_body;

const PAIR_QUERY: &str = r#"
query($pairId: String!) {
    pair(id: $pairId) {
        id
        token0 { name }
        token0Price
        token1 { name }
        token1Price
    }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PairData>,
}

#[derive(Debug, Deserialize)]
struct PairData {
    pair: Option<RawPair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPair {
    token0_price: String,
    token1_price: String,
}

/// Exchange rates of a pair: `token0_price` is token0 per token1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairQuote {
    pub token0_price: f64,
    pub token1_price: f64,
}

fn parse_price(raw: &str) -> Result<f64, MarketError> {
    raw.trim()
        .parse()
        .map_err(|_| MarketError::InvalidNumber(raw.to_string()))
}

fn quote_from_body(body: &str) -> Result<Option<PairQuote>, MarketError> {
    let response: GraphResponse = serde_json::from_str(body)?;
    let Some(pair) = response.data.and_then(|d| d.pair) else {
        return Ok(None);
    };
    Ok(Some(PairQuote {
        token0_price: parse_price(&pair.token0_price)?,
        token1_price: parse_price(&pair.token1_price)?,
    }))
}

pub struct SubgraphClient {
    client: Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Current quote for `pair_id`, or `None` when the subgraph has no such pair
    pub async fn pair(&self, pair_id: &str) -> Result<Option<PairQuote>, MarketError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "query": PAIR_QUERY, "variables": { "pairId": pair_id } }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Api {
                source_name: "subgraph",
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        let body = response.text().await?;
        debug!("pair {}: {}", pair_id, body);
        quote_from_body(&body)
    }

    /// Like [`SubgraphClient::pair`], asking again up to `retries` times with
    /// a pause while the pair is missing or the body does not decode
    pub async fn pair_with_retry(
        &self,
        pair_id: &str,
        retries: u32,
        pause: std::time::Duration,
    ) -> Result<PairQuote, MarketError> {
        let mut attempt = 0;
        loop {
            match self.pair(pair_id).await {
                Ok(Some(quote)) => return Ok(quote),
                Ok(None) if attempt >= retries => {
                    return Err(MarketError::PairNotFound(pair_id.to_string()))
                }
                Err(e) if attempt >= retries => return Err(e),
                Ok(None) => debug!("pair {} missing, retrying", pair_id),
                Err(e) => debug!("pair {} failed ({}), retrying", pair_id, e),
            }
            attempt += 1;
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_from_body() {
        let body = r#"{"data":{"pair":{"id":"0xe86204c4eddd2f70ee00ead6805f917671f56c52","token0":{"name":"Digg"},"token0Price":"1.0514","token1":{"name":"Wrapped BTC"},"token1Price":"0.9511"}}}"#;
        let quote = quote_from_body(body).unwrap().unwrap();
        assert_eq!(quote.token0_price, 1.0514);
        assert_eq!(quote.token1_price, 0.9511);
    }

    #[test]
    fn test_missing_pair_is_none() {
        assert_eq!(quote_from_body(r#"{"data":{"pair":null}}"#).unwrap(), None);
        assert_eq!(quote_from_body(r#"{"errors":[{"message":"x"}]}"#).unwrap(), None);
    }

    #[test]
    fn test_bad_price_is_error() {
        let body = r#"{"data":{"pair":{"token0Price":"abc","token1Price":"1"}}}"#;
        assert!(matches!(
            quote_from_body(body),
            Err(MarketError::InvalidNumber(_))
        ));
    }
}
