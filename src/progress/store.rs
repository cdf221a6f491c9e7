use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::UserProgress;

/// Current layout of the persisted progress document.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access progress file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize progress: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One-key storage for the serialized progress document.
///
/// Implementations only move opaque text around; decoding, migration and
/// fallback to defaults happen in [`super::ProgressManager`].
pub trait ProgressStore {
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, document: &str) -> Result<(), StoreError>;
}

impl<S: ProgressStore + ?Sized> ProgressStore for &S {
    fn read(&self) -> Result<Option<String>, StoreError> {
        (**self).read()
    }

    fn write(&self, document: &str) -> Result<(), StoreError> {
        (**self).write(document)
    }
}

/// Keeps the document in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.contents())
    }

    fn write(&self, document: &str) -> Result<(), StoreError> {
        *self.document.lock().unwrap_or_else(|e| e.into_inner()) = Some(document.to_string());
        Ok(())
    }
}

/// One JSON file per profile.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/<profile>.json`
    pub fn for_profile(data_dir: &Path, profile: &str) -> Self {
        Self::new(data_dir.join(format!("{}.json", profile)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProgressStore for JsonFileStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, document: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        // Write next to the target and rename so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, document).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    progress: &'a UserProgress,
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    progress: serde_json::Value,
}

pub(crate) fn encode(progress: &UserProgress) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&DocumentRef {
        version: DOCUMENT_VERSION,
        progress,
    })?)
}

/// Outcome of reading a stored document.
#[derive(Debug)]
pub(crate) enum Decoded {
    Current(UserProgress),
    /// A bare snapshot written before the versioned envelope existed.
    Legacy(UserProgress),
    Rejected(String),
}

pub(crate) fn decode(raw: &str) -> Decoded {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return Decoded::Rejected(format!("not JSON: {}", e)),
    };

    if value.get("version").is_some() {
        return match serde_json::from_value::<Document>(value) {
            Ok(doc) if doc.version == DOCUMENT_VERSION => {
                match serde_json::from_value(doc.progress) {
                    Ok(progress) => Decoded::Current(progress),
                    Err(e) => Decoded::Rejected(format!("bad v{} snapshot: {}", doc.version, e)),
                }
            }
            Ok(doc) => Decoded::Rejected(format!("unsupported version {}", doc.version)),
            Err(e) => Decoded::Rejected(format!("bad envelope: {}", e)),
        };
    }

    match serde_json::from_value(value) {
        Ok(progress) => Decoded::Legacy(progress),
        Err(e) => Decoded::Rejected(format!("unrecognised snapshot: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample() -> UserProgress {
        UserProgress::new(Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_file_store_missing_file_reads_none() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::for_profile(temp.path(), "nobody");
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path().join("nested/deeper/p.json"));
        store.write("{}").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("{}"));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_encode_then_decode_is_current() {
        let progress = sample();
        let raw = encode(&progress).unwrap();
        assert!(raw.starts_with("{\"version\":1"));
        match decode(&raw) {
            Decoded::Current(decoded) => assert_eq!(decoded, progress),
            other => panic!("expected current document, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bare_snapshot_is_legacy() {
        let raw = serde_json::to_string(&sample()).unwrap();
        assert!(matches!(decode(&raw), Decoded::Legacy(_)));
    }

    #[test]
    fn test_decode_rejects_garbage_and_future_versions() {
        assert!(matches!(decode("not json"), Decoded::Rejected(_)));
        assert!(matches!(decode("[1,2,3]"), Decoded::Rejected(_)));
        assert!(matches!(
            decode(r#"{"version":7,"progress":{}}"#),
            Decoded::Rejected(_)
        ));
        assert!(matches!(
            decode(r#"{"version":1,"progress":{"level":"high"}}"#),
            Decoded::Rejected(_)
        ));
    }
}
