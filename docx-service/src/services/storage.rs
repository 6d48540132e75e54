use crate::models::document::{is_document_file, is_staging_file, staging_file_name};
use crate::models::{DocumentId, StoredDocument};
use async_trait::async_trait;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;

/// Persistence for composed documents, keyed by [`DocumentId`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` under a fresh identifier.
    async fn put(&self, bytes: Vec<u8>) -> Result<StoredDocument, AppError>;

    /// Map a client path reference to a stored document. Anything that is
    /// not an issued `doc_<uuid>.docx` name inside the store yields `None`.
    async fn resolve(&self, reference: &str) -> Option<StoredDocument>;

    async fn get(&self, id: DocumentId) -> Result<Option<Vec<u8>>, AppError>;

    /// Returns whether a document was removed.
    async fn delete(&self, id: DocumentId) -> Result<bool, AppError>;

    /// Delete documents, and staging files left by interrupted writes, last
    /// modified at least `older_than` ago.
    async fn sweep(&self, older_than: Duration) -> Result<usize, AppError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        let base_path = fs::canonicalize(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, id: DocumentId) -> PathBuf {
        self.base_path.join(id.file_name())
    }
}

#[async_trait]
impl DocumentStore for LocalStorage {
    async fn put(&self, bytes: Vec<u8>) -> Result<StoredDocument, AppError> {
        let id = DocumentId::new();
        let path = self.path_for(id);
        let staging = self.base_path.join(staging_file_name(id));

        let written = match fs::write(&staging, bytes).await {
            Ok(()) => fs::rename(&staging, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging file");
                }
            }
            return Err(e.into());
        }

        Ok(StoredDocument { id, path })
    }

    async fn resolve(&self, reference: &str) -> Option<StoredDocument> {
        let id = DocumentId::from_reference(reference)?;
        let path = self.path_for(id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(StoredDocument { id, path }),
            _ => None,
        }
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Vec<u8>>, AppError> {
        match fs::read(self.path_for(id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: DocumentId) -> Result<bool, AppError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn sweep(&self, older_than: Duration) -> Result<usize, AppError> {
        let now = SystemTime::now();
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_document_file(&path) && !is_staging_file(&path) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read document age");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < older_than {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete expired document");
                }
            }
        }

        Ok(removed)
    }
}
