//! Market data sources for the price bots.

pub mod chain;
pub mod coingecko;
pub mod subgraph;

pub use chain::{RpcClient, TransferLog};
pub use coingecko::{CoinGeckoClient, CoinQuote};
pub use subgraph::{PairQuote, SubgraphClient};

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("market request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{source_name} returned {status}: {body}")]
    Api {
        source_name: &'static str,
        status: u16,
        body: String,
    },
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response is missing {0}")]
    MissingField(String),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid hex quantity '{0}'")]
    InvalidHex(String),
    #[error("not a number: '{0}'")]
    InvalidNumber(String),
    #[error("pair {0} not found in subgraph")]
    PairNotFound(String),
    #[error("no transaction with exactly two transfers in the last {blocks} blocks")]
    NoTransfers { blocks: u64 },
}

/// Compact a dollar amount for a status line: `1234567` becomes `1M`.
///
/// The value is truncated toward zero and its sign dropped first.
pub fn number_label(value: f64) -> String {
    let whole = value.trunc().abs();
    if whole >= 1.0e9 {
        format!("{}B", (whole / 1.0e9).round())
    } else if whole >= 1.0e6 {
        format!("{}M", (whole / 1.0e6).round())
    } else if whole >= 1.0e3 {
        format!("{}K", (whole / 1.0e3).round())
    } else {
        format!("{}", whole)
    }
}

/// Round to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
