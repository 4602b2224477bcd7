//! Content store for generated artifacts
//!
//! Every operation hands its output to a [`ContentStore`] and gets back a
//! [`StoredFile`] handle. Handles carry a UUID, so concurrent requests never
//! write the same location and no locking is needed.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file id: {0}")]
    InvalidId(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque handle to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub path: String,
}

pub trait ContentStore: Send + Sync {
    /// Persist `bytes` under a fresh id, using a cleaned-up `suggested_name`
    fn put(&self, bytes: &[u8], suggested_name: &str) -> Result<StoredFile, StoreError>;

    /// Find the handle for a previously stored id
    fn lookup(&self, id: &str) -> Result<StoredFile, StoreError>;

    fn get(&self, file: &StoredFile) -> Result<Vec<u8>, StoreError>;
}

/// Store backed by a local directory: `<root>/<uuid>/<filename>`
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create the store, making the root directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl ContentStore for DiskStore {
    fn put(&self, bytes: &[u8], suggested_name: &str) -> Result<StoredFile, StoreError> {
        let id = Uuid::new_v4().to_string();
        let filename = sanitize_filename(suggested_name);

        let dir = self.root.join(&id);
        fs::create_dir(&dir)?;
        let path = dir.join(&filename);
        fs::write(&path, bytes)?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());

        Ok(StoredFile {
            id,
            filename,
            path: path.display().to_string(),
        })
    }

    fn lookup(&self, id: &str) -> Result<StoredFile, StoreError> {
        let id = validate_id(id)?;
        let dir = self.root.join(&id);

        let entry = fs::read_dir(&dir)
            .map_err(|_| StoreError::NotFound(id.clone()))?
            .filter_map(|e| e.ok())
            .find(|e| e.path().is_file())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        Ok(StoredFile {
            filename: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path().display().to_string(),
            id,
        })
    }

    fn get(&self, file: &StoredFile) -> Result<Vec<u8>, StoreError> {
        let id = validate_id(&file.id)?;
        let path = self.root.join(&id).join(sanitize_filename(&file.filename));
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(id),
            _ => StoreError::Io(e),
        })
    }
}

/// In-process store, used by tests and embedders without a disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<String, (StoredFile, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, bytes: &[u8], suggested_name: &str) -> Result<StoredFile, StoreError> {
        let id = Uuid::new_v4().to_string();
        let filename = sanitize_filename(suggested_name);
        let file = StoredFile {
            path: format!("memory://{}/{}", id, filename),
            id: id.clone(),
            filename,
        };

        let mut files = self
            .files
            .write()
            .map_err(|_| std::io::Error::other("memory store lock poisoned"))?;
        files.insert(id, (file.clone(), bytes.to_vec()));
        Ok(file)
    }

    fn lookup(&self, id: &str) -> Result<StoredFile, StoreError> {
        let files = self
            .files
            .read()
            .map_err(|_| std::io::Error::other("memory store lock poisoned"))?;
        files
            .get(id)
            .map(|(file, _)| file.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn get(&self, file: &StoredFile) -> Result<Vec<u8>, StoreError> {
        let files = self
            .files
            .read()
            .map_err(|_| std::io::Error::other("memory store lock poisoned"))?;
        files
            .get(&file.id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(file.id.clone()))
    }
}

/// Ids are UUIDs; anything else could escape the store root
fn validate_id(id: &str) -> Result<String, StoreError> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Reduce a user-supplied name to a safe single path component
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "output".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}
