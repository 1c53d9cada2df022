//! SourceCred-style ledger handling.
//!
//! - [`types`]: entries, actions and alias addresses
//! - [`snapshot`]: a parsed ledger pinned to a version
//! - [`store`]: where the document lives, with conditional replace
//! - [`github`]: the GitHub contents API store
//! - [`activator`]: appending activation toggles for registered identities
//! - [`clean_id`]: ids for new ledger records

pub mod activator;
pub mod clean_id;
pub mod github;
pub mod snapshot;
pub mod store;
pub mod types;

use std::sync::Arc;

use color_eyre::Result;

use crate::config::LedgerConfig;
use crate::config_loader::resolve_secret;

pub use activator::{plan_bulk, ActivationOutcome, ActivationPlan, BulkActivation, LedgerActivator};
pub use github::GithubLedgerStore;
pub use snapshot::{LedgerParseError, LedgerSnapshot, IDENTITY_LEN};
pub use store::{content_version, FileLedgerStore, LedgerStore, LedgerStoreError, MemoryLedgerStore};
pub use types::{Action, ActivationRecord, AddressError, Alias, AliasAddress, LedgerEntry};

/// Build the store named by the configuration
pub fn open_ledger_store(
    config: &LedgerConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn LedgerStore>> {
    let store: Arc<dyn LedgerStore> = match config {
        LedgerConfig::Github {
            repo,
            path,
            branch,
            token_env,
            api_base,
        } => Arc::new(GithubLedgerStore::new(
            client,
            api_base.as_str(),
            repo.as_str(),
            path.as_str(),
            branch.as_str(),
            resolve_secret(token_env)?,
        )),
        LedgerConfig::File { path } => Arc::new(FileLedgerStore::new(path)),
    };
    Ok(store)
}
