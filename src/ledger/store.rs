//! Where the ledger document lives.
//!
//! Every write names the version it was computed from. A store refuses the
//! write with [`LedgerStoreError::Conflict`] when its current version differs,
//! leaving the stored document untouched.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use log::info;
use sha2::{Digest, Sha256};

use super::snapshot::{LedgerParseError, LedgerSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    #[error("ledger changed since version {expected} was read")]
    Conflict { expected: String },
    #[error("ledger request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ledger API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("ledger content is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ledger content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Parse(#[from] LedgerParseError),
    #[error("ledger I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    async fn load(&self) -> Result<LedgerSnapshot, LedgerStoreError>;

    /// Replace the whole document if the store is still at `expected_version`.
    /// Returns the new version.
    async fn replace(
        &self,
        expected_version: &str,
        document: &str,
        message: &str,
    ) -> Result<String, LedgerStoreError>;
}

/// Hex SHA-256 of a document, used as its version by local stores
pub fn content_version(document: &str) -> String {
    hex::encode(Sha256::digest(document.as_bytes()))
}

/// Process-local ledger
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    document: Mutex<String>,
}

impl MemoryLedgerStore {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(document.into()),
        }
    }

    pub fn document(&self) -> String {
        self.document.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Overwrite unconditionally, as another writer would
    pub fn set_document(&self, document: impl Into<String>) {
        *self.document.lock().unwrap_or_else(|e| e.into_inner()) = document.into();
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<LedgerSnapshot, LedgerStoreError> {
        let document = self.document();
        Ok(LedgerSnapshot::parse(content_version(&document), &document)?)
    }

    async fn replace(
        &self,
        expected_version: &str,
        document: &str,
        _message: &str,
    ) -> Result<String, LedgerStoreError> {
        let mut current = self.document.lock().unwrap_or_else(|e| e.into_inner());
        if content_version(&current) != expected_version {
            return Err(LedgerStoreError::Conflict {
                expected: expected_version.to_string(),
            });
        }
        *current = document.to_string();
        Ok(content_version(document))
    }
}

/// Ledger kept in a local file; a missing file is an empty ledger
#[derive(Debug)]
pub struct FileLedgerStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, LedgerStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(document) => Ok(document),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(LedgerStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn load(&self) -> Result<LedgerSnapshot, LedgerStoreError> {
        let document = self.read().await?;
        Ok(LedgerSnapshot::parse(content_version(&document), &document)?)
    }

    async fn replace(
        &self,
        expected_version: &str,
        document: &str,
        message: &str,
    ) -> Result<String, LedgerStoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read().await?;
        if content_version(&current) != expected_version {
            return Err(LedgerStoreError::Conflict {
                expected: expected_version.to_string(),
            });
        }

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| LedgerStoreError::Io { path, source }
        };
        tokio::fs::write(&tmp, document).await.map_err(io_err(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_err(&self.path))?;
        info!("Wrote {} ({})", self.path.display(), message);
        Ok(content_version(document))
    }
}
