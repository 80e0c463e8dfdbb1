use chrono::Utc;
use parking_lot::RwLock;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::models::Document;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store file {path} is corrupt: {source}. Set STORE_RESTORE_FROM_BACKUP=true to recover from the backup.")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Backup {path} cannot be used: {reason}")]
    BackupUnusable { path: PathBuf, reason: String },
}

/// Single-file JSON document store.
///
/// Readers get the last committed snapshot. Writers are serialized by
/// `writer`, mutate a private copy, persist it, and only then publish it.
pub struct DocumentStore {
    path: PathBuf,
    committed: RwLock<Arc<Document>>,
    writer: Mutex<()>,
}

impl DocumentStore {
    /// Load the document, creating an empty one if the file does not exist.
    pub async fn load(config: &StorageConfig) -> Result<Self, StoreError> {
        let path = config.data_file.clone();

        let document = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Document>(&bytes) {
                Ok(document) => document,
                Err(source) if config.restore_from_backup => {
                    warn!(path = %path.display(), error = %source, "Store file is corrupt, restoring from backup");
                    restore_from_backup(&path).await?
                }
                Err(source) => return Err(StoreError::Corrupt { path, source }),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No store file found, initializing empty document");
                let document = Document::default();
                write_atomically(&path, &document).await?;
                document
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            players = document.players.len(),
            matches = document.matches.len(),
            "Document store loaded"
        );

        Ok(Self {
            path,
            committed: RwLock::new(Arc::new(document)),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "bak")
    }

    /// Latest committed state. Never observes a transaction in progress.
    pub fn snapshot(&self) -> Arc<Document> {
        self.committed.read().clone()
    }

    /// Run `f` against a private copy of the document under the writer lock.
    ///
    /// On `Ok` the copy is persisted (when it changed) and becomes the new
    /// committed snapshot. On `Err`, or if persisting fails, nothing changes.
    pub async fn with_transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Document) -> Result<R, E>,
        E: From<StoreError>,
    {
        let _guard = self.writer.lock().await;

        let current = self.snapshot();
        let mut shadow = Document::clone(&current);
        let output = f(&mut shadow)?;

        if shadow != *current {
            if let Err(e) = write_atomically(&self.path, &shadow).await {
                error!(path = %self.path.display(), error = %e, "Failed to persist store");
                return Err(e.into());
            }
            *self.committed.write() = Arc::new(shadow);
            debug!("Transaction committed");
        }

        Ok(output)
    }

    /// Persist the committed snapshot; used on shutdown.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot();
        write_atomically(&self.path, &current).await?;
        info!(path = %self.path.display(), "Document store flushed");
        Ok(())
    }
}

/// Cheap liveness probe for the health endpoint: the data file must still be readable.
pub async fn health_check(store: &DocumentStore) -> Result<(), StoreError> {
    fs::metadata(store.path()).await?;
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("store.json"));
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Write to `<file>.tmp`, fsync, keep the previous version as `<file>.bak`,
/// then rename over the data file.
async fn write_atomically(path: &Path, document: &Document) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = sibling(path, "tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);

    if fs::try_exists(path).await? {
        fs::copy(path, sibling(path, "bak")).await?;
    }
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn restore_from_backup(path: &Path) -> Result<Document, StoreError> {
    let backup = sibling(path, "bak");
    let bytes = fs::read(&backup)
        .await
        .map_err(|e| StoreError::BackupUnusable {
            path: backup.clone(),
            reason: e.to_string(),
        })?;
    let document: Document =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::BackupUnusable {
            path: backup.clone(),
            reason: e.to_string(),
        })?;

    let quarantine = sibling(path, &format!("corrupt-{}", Utc::now().format("%Y%m%dT%H%M%SZ")));
    fs::rename(path, &quarantine).await?;
    warn!(quarantined = %quarantine.display(), "Corrupt store file moved aside");

    write_atomically(path, &document).await?;
    Ok(document)
}
