//! Registration request queue.
//!
//! The queue is a FIFO of opaque string bodies with receive-then-delete
//! consumption. A received message stays invisible to later receives until it
//! is deleted or the process restarts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use log::debug;

/// A received message and the handle needed to delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown receipt handle: {0}")]
    UnknownReceipt(String),
}

#[async_trait]
pub trait RegistrationQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Append a message; returns its id.
    async fn push(&self, body: &str) -> Result<String, QueueError>;

    /// Receive up to `max` messages, oldest first. An empty batch means the
    /// queue has nothing visible.
    async fn receive_batch(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError>;

    async fn delete(&self, receipt: &str) -> Result<(), QueueError>;
}

#[derive(Debug, Default)]
struct MemoryQueueState {
    pending: VecDeque<(String, String)>,
    in_flight: HashMap<String, String>,
    next_id: u64,
}

/// Process-local queue
#[derive(Debug, Default)]
pub struct MemoryQueue {
    name: String,
    state: Mutex<MemoryQueueState>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryQueueState::default()),
        }
    }

    /// Messages not yet received
    pub fn visible_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Messages received but not deleted
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryQueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RegistrationQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, body: &str) -> Result<String, QueueError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("{}-{:08}", self.name, state.next_id);
        state.pending.push_back((id.clone(), body.to_string()));
        Ok(id)
    }

    async fn receive_batch(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut state = self.lock();
        let mut batch = Vec::with_capacity(max.min(state.pending.len()));
        while batch.len() < max {
            let Some((id, body)) = state.pending.pop_front() else {
                break;
            };
            state.in_flight.insert(id.clone(), body.clone());
            batch.push(QueueMessage { receipt: id, body });
        }
        Ok(batch)
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        self.lock()
            .in_flight
            .remove(receipt)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt.to_string()))
    }
}

/// Spool-directory queue: one JSON file per message under `<root>/<name>/`.
///
/// File names sort in push order. Messages received but not deleted before a
/// restart are delivered again.
#[derive(Debug)]
pub struct FileQueue {
    name: String,
    dir: PathBuf,
    sequence: AtomicU64,
    in_flight: Mutex<HashSet<String>>,
}

impl FileQueue {
    pub async fn open(root: &Path, name: &str) -> Result<Self, QueueError> {
        let dir = root.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| QueueError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            dir,
            sequence: AtomicU64::new(0),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> QueueError + '_ {
        move |source| QueueError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    async fn spooled_files(&self) -> Result<Vec<String>, QueueError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(Self::io_err(&self.dir))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(Self::io_err(&self.dir))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl RegistrationQueue for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, body: &str) -> Result<String, QueueError> {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let id = format!("{:020}-{:06}", nanos, seq % 1_000_000);
        let tmp = self.dir.join(format!("{}.tmp", id));
        let path = self.dir.join(format!("{}.json", id));

        tokio::fs::write(&tmp, body).await.map_err(Self::io_err(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(Self::io_err(&path))?;
        debug!("Spooled queue message {} to {:?}", id, path);
        Ok(id)
    }

    async fn receive_batch(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let all = self.spooled_files().await?;
        let candidates: Vec<String> = {
            let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            all.into_iter()
                .filter(|name| !in_flight.contains(name))
                .take(max)
                .collect()
        };

        let mut batch = Vec::with_capacity(candidates.len());
        for file_name in candidates {
            let path = self.dir.join(&file_name);
            let body = match tokio::fs::read_to_string(&path).await {
                Ok(body) => body,
                // Deleted by another consumer between listing and reading.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(QueueError::Io { path, source }),
            };
            self.in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(file_name.clone());
            batch.push(QueueMessage {
                receipt: file_name,
                body,
            });
        }
        Ok(batch)
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        let removed = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(receipt);
        if !removed {
            return Err(QueueError::UnknownReceipt(receipt.to_string()));
        }
        let path = self.dir.join(receipt);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(QueueError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_queue_fifo_and_visibility() {
        let queue = MemoryQueue::new("registrations");
        for i in 0..3 {
            queue.push(&format!("body-{}", i)).await.unwrap();
        }

        let first = queue.receive_batch(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].body, "body-0");
        assert_eq!(first[1].body, "body-1");
        assert_eq!(queue.visible_len(), 1);
        assert_eq!(queue.in_flight_len(), 2);

        let second = queue.receive_batch(10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "body-2");
        assert!(queue.receive_batch(10).await.unwrap().is_empty());

        for message in first.iter().chain(second.iter()) {
            queue.delete(&message.receipt).await.unwrap();
        }
        assert_eq!(queue.in_flight_len(), 0);
        assert!(matches!(
            queue.delete(&first[0].receipt).await,
            Err(QueueError::UnknownReceipt(_))
        ));
    }

    #[tokio::test]
    async fn test_file_queue_round_trip() {
        let dir = TempDir::new().unwrap();
        let queue = FileQueue::open(dir.path(), "registrations").await.unwrap();

        queue.push("first").await.unwrap();
        queue.push("second").await.unwrap();

        let batch = queue.receive_batch(10).await.unwrap();
        assert_eq!(
            batch.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert!(queue.receive_batch(10).await.unwrap().is_empty());

        queue.delete(&batch[0].receipt).await.unwrap();
        assert!(!dir.path().join("registrations").join(&batch[0].receipt).exists());
    }

    #[tokio::test]
    async fn test_file_queue_redelivers_after_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let queue = FileQueue::open(dir.path(), "registrations").await.unwrap();
            queue.push("undeleted").await.unwrap();
            assert_eq!(queue.receive_batch(10).await.unwrap().len(), 1);
        }

        let reopened = FileQueue::open(dir.path(), "registrations").await.unwrap();
        let batch = reopened.receive_batch(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "undeleted");
    }
}
