//! Vault ("sett") tokens: assets under management and the underlying ratio.
//!
//! The ratio of underlying tokens per vault share is read off the most recent
//! deposit or withdrawal, i.e. the latest transaction that moved exactly two
//! ERC20 transfers: one of the vault token and one of the underlying.

use std::collections::HashSet;

use async_trait::async_trait;
use log::debug;

use super::price::{BotDisplay, PriceSource};
use crate::market::{number_label, round_to, CoinGeckoClient, MarketError, RpcClient, TransferLog};

/// Block windows searched for a deposit or withdrawal, newest first
pub const SEARCH_WINDOWS: [u64; 4] = [10, 100, 1_000, 10_000];

/// Underlying tokens per vault share, from a two-transfer transaction.
///
/// Returns `None` when neither transfer is of the vault token or a share
/// amount is zero.
pub fn underlying_ratio(
    transfers: &[TransferLog],
    vault: &str,
    vault_decimals: u32,
    underlying_decimals: u32,
) -> Option<f64> {
    let [first, second] = transfers else {
        return None;
    };
    let vault = vault.to_ascii_lowercase();
    let (shares, underlying) = if first.token == vault {
        (first, second)
    } else if second.token == vault {
        (second, first)
    } else {
        return None;
    };

    let shares = shares.value / 10f64.powi(vault_decimals as i32);
    let underlying = underlying.value / 10f64.powi(underlying_decimals as i32);
    (shares > 0.0).then(|| underlying / shares)
}

pub fn sett_display(symbol: &str, price_usd: f64, aum_usd: f64, ratio: f64) -> BotDisplay {
    BotDisplay {
        activity: format!("aum=${} ratio={}", number_label(aum_usd), round_to(ratio, 2)),
        nickname: format!("{} ${}", symbol, price_usd),
    }
}

pub struct SettSource {
    pub(crate) coingecko: CoinGeckoClient,
    pub(crate) coingecko_id: String,
    pub(crate) rpc: RpcClient,
    pub(crate) token_address: String,
    pub(crate) underlying_decimals: u32,
    pub(crate) symbol: String,
}

impl SettSource {
    /// Transfers of the newest transaction with exactly two of them
    async fn latest_transfer_pair(&self) -> Result<Vec<TransferLog>, MarketError> {
        let head = self.rpc.block_number().await?;
        let mut checked = HashSet::new();

        for window in SEARCH_WINDOWS {
            let logs = self
                .rpc
                .transfer_logs(&self.token_address, head.saturating_sub(window))
                .await?;
            for log in logs.iter().rev() {
                let Some(tx_hash) = &log.transaction_hash else {
                    continue;
                };
                if !checked.insert(tx_hash.clone()) {
                    continue;
                }
                let transfers = self.rpc.receipt_transfers(tx_hash).await?;
                if transfers.len() == 2 {
                    debug!("ratio from {}", tx_hash);
                    return Ok(transfers);
                }
            }
        }

        Err(MarketError::NoTransfers {
            blocks: SEARCH_WINDOWS[SEARCH_WINDOWS.len() - 1],
        })
    }

    pub async fn ratio(&self) -> Result<f64, MarketError> {
        let transfers = self.latest_transfer_pair().await?;
        let vault_decimals = self.rpc.decimals(&self.token_address).await?;
        underlying_ratio(
            &transfers,
            &self.token_address,
            vault_decimals,
            self.underlying_decimals,
        )
        .ok_or_else(|| MarketError::MissingField("vault transfer in latest deposit".to_string()))
    }
}

#[async_trait]
impl PriceSource for SettSource {
    async fn fetch(&self) -> Result<BotDisplay, MarketError> {
        let quote = self.coingecko.quote(&self.coingecko_id).await?;
        let supply = self.rpc.token_supply(&self.token_address).await?;
        let ratio = self.ratio().await?;
        Ok(sett_display(
            &self.symbol,
            quote.price_usd,
            supply * quote.price_usd,
            ratio,
        ))
    }
}
