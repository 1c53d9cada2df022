//! Periodic drain of the registration queue into the ledger.
//!
//! One cycle:
//! 1. load a fresh ledger snapshot (failure aborts the cycle)
//! 2. receive and delete batches until the queue comes back empty
//! 3. keep the last request per identity
//! 4. activate every identity in one ledger write
//! 5. only after that write, upsert the resolved identities into the table
//!
//! Messages are deleted as soon as they are received, so a request is
//! consumed at most once even when the cycle later fails. A failed delete is
//! logged and the message is still processed; if the queue redelivers it
//! later, the toggle is skipped as already active and the upsert repeats.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};

use super::types::RegistrationRequest;
use crate::chat::ChatClient;
use crate::ledger::{LedgerActivator, LedgerStoreError};
use crate::platform::{QueueError, RegistrationQueue, RegistrationTable, TableError};

pub const PENDING_MESSAGE: &str = "We received your SourceCred registration, but your account \
is not in the SourceCred ledger yet. The ledger picks up new members daily, so please send \
`!register` again tomorrow.";

#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerStoreError),
    #[error("queue: {0}")]
    Queue(#[from] QueueError),
    #[error("registration table: {0}")]
    Table(#[from] TableError),
}

/// Counts from one drain cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages received and deleted
    pub drained: usize,
    /// Messages dropped because they did not decode to a request
    pub malformed: usize,
    /// Messages processed even though their delete failed
    pub undeleted: usize,
    /// Distinct identities among the valid requests
    pub unique: usize,
    /// Identities that received a new ledger toggle
    pub activated: usize,
    /// Identities already active in the ledger
    pub already_active: usize,
    /// Identities with no ledger alias yet
    pub pending: usize,
}

#[derive(Debug, Clone)]
pub struct DrainOptions {
    pub batch_size: usize,
    pub notify_pending: bool,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            notify_pending: true,
        }
    }
}

pub struct DrainWorker {
    queue: Arc<dyn RegistrationQueue>,
    table: Arc<dyn RegistrationTable>,
    activator: LedgerActivator,
    chat: Option<Arc<dyn ChatClient>>,
    options: DrainOptions,
}

impl DrainWorker {
    pub fn new(
        queue: Arc<dyn RegistrationQueue>,
        table: Arc<dyn RegistrationTable>,
        activator: LedgerActivator,
        options: DrainOptions,
    ) -> Self {
        Self {
            queue,
            table,
            activator,
            chat: None,
            options,
        }
    }

    /// Send pending notices through `chat`
    pub fn with_chat(mut self, chat: Arc<dyn ChatClient>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Receive and delete everything visible, keeping the last request per identity
    async fn drain_queue(
        &self,
        report: &mut DrainReport,
    ) -> Result<BTreeMap<String, RegistrationRequest>, QueueError> {
        let mut requests = BTreeMap::new();
        loop {
            let batch = self.queue.receive_batch(self.options.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            for message in batch {
                report.drained += 1;
                if let Err(e) = self.queue.delete(&message.receipt).await {
                    warn!("Failed to delete queue message {}: {}", message.receipt, e);
                    report.undeleted += 1;
                }

                match RegistrationRequest::from_json(&message.body) {
                    Ok(request) if !request.identity.is_empty() => {
                        debug!("Drained registration for {}", request.identity);
                        requests.insert(request.identity.clone(), request);
                    }
                    Ok(_) => {
                        warn!("Dropping registration without an identity: {}", message.body);
                        report.malformed += 1;
                    }
                    Err(e) => {
                        warn!("Dropping malformed registration message: {}", e);
                        report.malformed += 1;
                    }
                }
            }
        }
        Ok(requests)
    }

    pub async fn run_cycle(&self) -> Result<DrainReport, DrainError> {
        let snapshot = self.activator.load_snapshot().await?;

        let mut report = DrainReport::default();
        let requests = self.drain_queue(&mut report).await?;
        report.unique = requests.len();
        if requests.is_empty() {
            debug!("Registration queue {} is empty", self.queue.name());
            return Ok(report);
        }
        info!(
            "Drained {} messages ({} identities) from {}",
            report.drained,
            report.unique,
            self.queue.name()
        );

        let outcome = self
            .activator
            .activate(&snapshot, requests.keys().map(String::as_str))
            .await?;

        for identity in outcome.resolved() {
            if let Some(request) = requests.get(identity) {
                self.table.upsert(&request.to_user_record()).await?;
            }
        }

        report.activated = outcome.plan.activated.len();
        report.already_active = outcome.plan.already_active.len();
        report.pending = outcome.plan.unresolved.len();

        if self.options.notify_pending {
            if let Some(chat) = &self.chat {
                for identity in &outcome.plan.unresolved {
                    if let Err(e) = chat.send_direct_message(identity, PENDING_MESSAGE).await {
                        warn!("Failed to send pending notice to {}: {}", identity, e);
                    }
                }
            }
        }

        info!(
            "Drain cycle done: activated {}, already active {}, pending {}",
            report.activated, report.already_active, report.pending
        );
        Ok(report)
    }
}
