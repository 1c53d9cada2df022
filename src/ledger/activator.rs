//! Turning drained identities into ledger activations.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};

use super::clean_id;
use super::snapshot::LedgerSnapshot;
use super::store::{LedgerStore, LedgerStoreError};
use super::types::ActivationRecord;

pub const COMMIT_MESSAGE: &str = "update ledger to activate users";

/// What one activation pass decided for each identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationPlan {
    /// Platform identities that received a new toggle
    pub activated: Vec<String>,
    /// Platform identities whose ledger id is already active
    pub already_active: Vec<String>,
    /// Platform identities with no alias in the ledger
    pub unresolved: Vec<String>,
    pub records: Vec<ActivationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOutcome {
    pub plan: ActivationPlan,
    /// Ledger version after the write; `None` when nothing was written
    pub new_version: Option<String>,
}

impl ActivationOutcome {
    /// Identities the ledger now counts as active
    pub fn resolved(&self) -> impl Iterator<Item = &str> {
        self.plan
            .activated
            .iter()
            .chain(self.plan.already_active.iter())
            .map(String::as_str)
    }
}

pub struct LedgerActivator {
    store: Arc<dyn LedgerStore>,
    platform_tag: String,
}

impl LedgerActivator {
    pub fn new(store: Arc<dyn LedgerStore>, platform_tag: impl Into<String>) -> Self {
        Self {
            store,
            platform_tag: platform_tag.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn load_snapshot(&self) -> Result<LedgerSnapshot, LedgerStoreError> {
        let snapshot = self.store.load().await?;
        debug!(
            "Loaded {} ledger entries from {} at {}",
            snapshot.len(),
            self.store.describe(),
            snapshot.version()
        );
        Ok(snapshot)
    }

    /// Decide which identities get a toggle, without touching the store.
    ///
    /// Each ledger id is toggled at most once per plan, and never when the
    /// snapshot already has it active.
    pub fn plan<'a, I>(&self, snapshot: &LedgerSnapshot, identities: I, now_ms: i64) -> ActivationPlan
    where
        I: IntoIterator<Item = &'a str>,
    {
        let active = snapshot.active_identities();
        let mut toggled: HashSet<&str> = HashSet::new();
        let mut plan = ActivationPlan::default();

        for identity in identities {
            let Some(ledger_id) = snapshot.find_identity(identity, &self.platform_tag) else {
                debug!("No {} alias for {}", self.platform_tag, identity);
                plan.unresolved.push(identity.to_string());
                continue;
            };
            if active.contains(ledger_id) || !toggled.insert(ledger_id) {
                plan.already_active.push(identity.to_string());
                continue;
            }
            plan.records
                .push(ActivationRecord::new(ledger_id, now_ms, clean_id::generate()));
            plan.activated.push(identity.to_string());
        }
        plan
    }

    /// Plan against `snapshot` and write the result back in one replace.
    ///
    /// Any store error, including a conflict, is returned unchanged and the
    /// snapshot stays as it was.
    pub async fn activate<'a, I>(
        &self,
        snapshot: &LedgerSnapshot,
        identities: I,
    ) -> Result<ActivationOutcome, LedgerStoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let plan = self.plan(snapshot, identities, Utc::now().timestamp_millis());
        if plan.records.is_empty() {
            info!(
                "Nothing to activate ({} already active, {} unresolved)",
                plan.already_active.len(),
                plan.unresolved.len()
            );
            return Ok(ActivationOutcome {
                plan,
                new_version: None,
            });
        }

        let document = snapshot.render_with(&plan.records);
        let new_version = self
            .store
            .replace(snapshot.version(), &document, COMMIT_MESSAGE)
            .await?;
        info!(
            "Activated {} identities in {}",
            plan.records.len(),
            self.store.describe()
        );
        Ok(ActivationOutcome {
            plan,
            new_version: Some(new_version),
        })
    }
}

/// Toggles for every platform alias at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkActivation {
    pub records: Vec<ActivationRecord>,
    /// Alias descriptions skipped because they were excluded
    pub excluded: Vec<String>,
    /// Ledger ids skipped because they are already active
    pub already_active: Vec<String>,
}

/// Activate every ledger identity holding a `platform_tag` alias whose
/// description is not in `excluded`.
pub fn plan_bulk(
    snapshot: &LedgerSnapshot,
    platform_tag: &str,
    excluded: &HashSet<String>,
    now_ms: i64,
) -> BulkActivation {
    let active = snapshot.active_identities();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut bulk = BulkActivation::default();

    for (identity_id, alias, _) in snapshot.platform_aliases(platform_tag) {
        if excluded.contains(&alias.description) {
            bulk.excluded.push(alias.description.clone());
            continue;
        }
        if !seen.insert(identity_id) {
            continue;
        }
        if active.contains(identity_id) {
            bulk.already_active.push(identity_id.to_string());
            continue;
        }
        bulk.records
            .push(ActivationRecord::new(identity_id, now_ms, clean_id::generate()));
    }
    bulk
}
