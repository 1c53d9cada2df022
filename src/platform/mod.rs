//! Queue and table services the registration relay is built on.
//!
//! Both are external collaborators. The traits capture only the operations
//! the relay needs; in-memory adapters back the tests and file-backed
//! adapters back single-host deployments.

pub mod queue;
pub mod table;

use std::path::Path;
use std::sync::Arc;

use crate::config::{RegistrationConfig, StorageBackend};

pub use queue::{FileQueue, MemoryQueue, QueueError, QueueMessage, RegistrationQueue};
pub use table::{FileTable, MemoryTable, RegistrationTable, TableError};

/// Build the queue and table selected by the registration configuration
pub async fn open_registration_storage(
    config: &RegistrationConfig,
    state_dir: &Path,
) -> color_eyre::eyre::Result<(Arc<dyn RegistrationQueue>, Arc<dyn RegistrationTable>)> {
    match config.storage {
        StorageBackend::Memory => {
            log::warn!("Registration storage is in-memory; pending requests are lost on restart");
            Ok((
                Arc::new(MemoryQueue::new(&config.queue_name)),
                Arc::new(MemoryTable::new(&config.table_name)),
            ))
        }
        StorageBackend::File => {
            let queue = FileQueue::open(&state_dir.join("queues"), &config.queue_name).await?;
            let table = FileTable::open(&state_dir.join("tables"), &config.table_name).await?;
            log::info!(
                "Registration storage under {:?} (queue '{}', table '{}')",
                state_dir,
                config.queue_name,
                config.table_name
            );
            Ok((Arc::new(queue), Arc::new(table)))
        }
    }
}
