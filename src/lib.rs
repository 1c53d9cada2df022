//! # badger-bots - community chat bots for the Badger DAO
//!
//! Two kinds of bot share this crate:
//!
//! - **Price bots** poll market data on an interval and publish it as the
//!   bot's presence and guild nickname.
//! - **The registration relay** takes `!register` submissions from chat,
//!   queues them, and on a timer drains the queue into a SourceCred ledger by
//!   appending activation records for each newly registered identity.
//!
//! ## Architecture
//!
//! - `config`: typed YAML configuration and validation
//! - `config_loader`: loading the file, `.env` support and secret lookup
//! - `http`: the shared outbound HTTP client
//! - `chat`: the chat client trait, Discord REST adapter, gateways and dry-run client
//! - `platform`: queue and table traits with memory and file adapters
//! - `registration`: intake parsing and the drain cycle
//! - `ledger`: ledger parsing, alias lookup, activation and storage
//! - `market`: CoinGecko, Uniswap subgraph and JSON-RPC clients
//! - `bots`: the long-running bot loops and their wiring
//!
//! ## Registration flow
//!
//! ```text
//! chat message -> Intake -> queue -> (timer) DrainWorker -> LedgerActivator
//!                                          |                     |
//!                                          v                     v
//!                                  registration table <-- ledger write succeeded
//! ```
//!
//! A drain cycle reloads the ledger, drains every queued request keeping the
//! last one per identity, writes all activations in one conditional replace,
//! and only then records the identities in the table.
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!   state_dir: ./state
//!
//! registration:
//!   token_env: BOT_TOKEN_GENERAL
//!   drain_interval: 1h
//!   ledger:
//!     backend: github
//!     repo: Badger-Finance/SourceCred
//!     token_env: BADGER_SOURCECRED_PAT
//!
//! price_bots:
//!   - kind: coingecko
//!     name: badger
//!     token_env: BOT_TOKEN_BADGER
//!     symbol: BADGER
//!     coingecko_id: badger-dao
//! ```
//!
//! ## Error Handling
//!
//! Library modules return their own `thiserror` enums. Binaries and the
//! configuration loader use `color_eyre` for reports with context.

pub mod bots;
pub mod chat;
pub mod config;
pub mod config_loader;
pub mod http;
pub mod ledger;
pub mod market;
pub mod platform;
pub mod registration;
