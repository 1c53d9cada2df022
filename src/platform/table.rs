//! Registration table keyed by identity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::registration::RegisteredUserRecord;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("table I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("key {0:?} is not usable as a table key")]
    InvalidKey(String),
    #[error("table backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RegistrationTable: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, identity: &str) -> Result<Option<RegisteredUserRecord>, TableError>;

    /// Insert or overwrite the row for `record.identity`.
    async fn upsert(&self, record: &RegisteredUserRecord) -> Result<(), TableError>;

    async fn contains(&self, identity: &str) -> Result<bool, TableError> {
        Ok(self.get(identity).await?.is_some())
    }
}

/// Process-local table
#[derive(Debug, Default)]
pub struct MemoryTable {
    name: String,
    rows: Mutex<HashMap<String, RegisteredUserRecord>>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RegistrationTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, identity: &str) -> Result<Option<RegisteredUserRecord>, TableError> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .cloned())
    }

    async fn upsert(&self, record: &RegisteredUserRecord) -> Result<(), TableError> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.identity.clone(), record.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document per row under `<root>/<name>/<key>.json`
#[derive(Debug)]
pub struct FileTable {
    name: String,
    dir: PathBuf,
}

impl FileTable {
    pub async fn open(root: &Path, name: &str) -> Result<Self, TableError> {
        let dir = root.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| TableError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            dir,
        })
    }

    fn row_path(&self, identity: &str) -> Result<PathBuf, TableError> {
        let usable = !identity.is_empty()
            && identity
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !usable {
            return Err(TableError::InvalidKey(identity.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", identity)))
    }
}

#[async_trait]
impl RegistrationTable for FileTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, identity: &str) -> Result<Option<RegisteredUserRecord>, TableError> {
        let path = self.row_path(identity)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(TableError::Io { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| TableError::Corrupt { path, source })
    }

    async fn upsert(&self, record: &RegisteredUserRecord) -> Result<(), TableError> {
        let path = self.row_path(&record.identity)?;
        let json = serde_json::to_string_pretty(record).map_err(|source| TableError::Corrupt {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| TableError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| TableError::Io { path, source })
    }
}
