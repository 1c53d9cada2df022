//! Minimal Ethereum JSON-RPC reads: ERC20 supply and `Transfer` logs.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::MarketError;
use crate::http::error_body;

/// `keccak256("Transfer(address,address,uint256)")`
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const TOTAL_SUPPLY_SELECTOR: &str = "0x18160ddd";
const DECIMALS_SELECTOR: &str = "0x313ce567";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReceipt {
    #[serde(default)]
    logs: Vec<RawLog>,
}

/// A decoded ERC20 `Transfer` event
#[derive(Debug, Clone, PartialEq)]
pub struct TransferLog {
    /// Token contract that emitted the event
    pub token: String,
    pub from: String,
    pub to: String,
    /// Raw token units
    pub value: f64,
    pub transaction_hash: Option<String>,
}

impl TransferLog {
    /// Decode `log` if it is a standard `Transfer` with indexed from/to
    pub fn decode(log: &RawLog) -> Option<Self> {
        if log.topics.len() != 3 || !log.topics[0].eq_ignore_ascii_case(TRANSFER_TOPIC) {
            return None;
        }
        Some(Self {
            token: log.address.to_ascii_lowercase(),
            from: topic_address(&log.topics[1])?,
            to: topic_address(&log.topics[2])?,
            value: hex_to_f64(&log.data).ok()?,
            transaction_hash: log.transaction_hash.clone(),
        })
    }
}

fn strip_hex(raw: &str) -> &str {
    raw.strip_prefix("0x").unwrap_or(raw)
}

/// Parse a hex quantity into a float; exact up to 2^53, approximate beyond
pub fn hex_to_f64(raw: &str) -> Result<f64, MarketError> {
    let digits = strip_hex(raw);
    if digits.is_empty() {
        return Ok(0.0);
    }
    digits.chars().try_fold(0.0f64, |acc, c| {
        c.to_digit(16)
            .map(|d| acc * 16.0 + d as f64)
            .ok_or_else(|| MarketError::InvalidHex(raw.to_string()))
    })
}

pub fn hex_to_u64(raw: &str) -> Result<u64, MarketError> {
    u64::from_str_radix(strip_hex(raw), 16).map_err(|_| MarketError::InvalidHex(raw.to_string()))
}

/// The address held in the low 20 bytes of an indexed topic
fn topic_address(topic: &str) -> Option<String> {
    let digits = strip_hex(topic);
    if digits.len() < 40 || !digits.is_ascii() {
        return None;
    }
    Some(format!("0x{}", digits[digits.len() - 40..].to_ascii_lowercase()))
}

pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, MarketError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Api {
                source_name: "rpc",
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let body: RpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(MarketError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = body
            .result
            .ok_or_else(|| MarketError::MissingField(format!("{} result", method)))?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn block_number(&self) -> Result<u64, MarketError> {
        let raw: String = self.call("eth_blockNumber", json!([])).await?;
        hex_to_u64(&raw)
    }

    async fn eth_call(&self, to: &str, data: &str) -> Result<String, MarketError> {
        self.call("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    pub async fn decimals(&self, token: &str) -> Result<u32, MarketError> {
        let raw = self.eth_call(token, DECIMALS_SELECTOR).await?;
        let decimals = hex_to_u64(&raw)?;
        u32::try_from(decimals).map_err(|_| MarketError::InvalidHex(raw))
    }

    /// `totalSupply / 10^decimals`
    pub async fn token_supply(&self, token: &str) -> Result<f64, MarketError> {
        let raw = self.eth_call(token, TOTAL_SUPPLY_SELECTOR).await?;
        let total = hex_to_f64(&raw)?;
        let decimals = self.decimals(token).await?;
        let supply = total / 10f64.powi(decimals as i32);
        debug!("{} supply {}", token, supply);
        Ok(supply)
    }

    /// `Transfer` events emitted by `token` from `from_block` to the chain head
    pub async fn transfer_logs(
        &self,
        token: &str,
        from_block: u64,
    ) -> Result<Vec<TransferLog>, MarketError> {
        let filter = json!([{
            "address": token,
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": "latest",
            "topics": [TRANSFER_TOPIC],
        }]);
        let logs: Vec<RawLog> = self.call("eth_getLogs", filter).await?;
        Ok(logs.iter().filter_map(TransferLog::decode).collect())
    }

    /// Every `Transfer` event in a transaction, from any token
    pub async fn receipt_transfers(&self, tx_hash: &str) -> Result<Vec<TransferLog>, MarketError> {
        let receipt: Option<RawReceipt> = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        Ok(receipt
            .map(|r| r.logs.iter().filter_map(TransferLog::decode).collect())
            .unwrap_or_default())
    }
}
