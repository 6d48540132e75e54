use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_PREFIX: &str = "doc_";
const FILE_EXTENSION: &str = ".docx";

/// Identifier of a stored document; the file on disk is `doc_<uuid>.docx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn file_name(&self) -> String {
        format!("{FILE_PREFIX}{}{FILE_EXTENSION}", self.0)
    }

    /// Parse an issued file name such as `doc_<uuid>.docx`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let uuid = name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?;
        // Only the canonical hyphenated form is ever issued.
        if uuid.len() != 36 {
            return None;
        }
        Uuid::parse_str(uuid).ok().map(Self)
    }

    /// Extract the identifier from a client-supplied path reference.
    ///
    /// Only the final segment is considered; both `/` and `\` separate
    /// segments so references issued on either platform resolve.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let name = reference.trim().rsplit(['/', '\\']).next()?;
        Self::from_file_name(name)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub path: PathBuf,
}

impl StoredDocument {
    /// Path reference handed back to clients as `Ruta`.
    pub fn reference(&self) -> String {
        self.path.display().to_string()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.file_name())
    }
}

pub(crate) fn is_document_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(DocumentId::from_file_name)
        .is_some()
}

/// Staging name a document is written under before being renamed into place.
pub(crate) fn staging_file_name(id: DocumentId) -> String {
    format!("{}.tmp", id.file_name())
}

pub(crate) fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".tmp"))
        .and_then(DocumentId::from_file_name)
        .is_some()
}
