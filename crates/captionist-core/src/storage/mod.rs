//! Persistence for uploaded images and caption records.
//!
//! - **object**: image bytes and thumbnails, plus signed access URLs
//! - **metadata**: caption records, history paging, retention purge
//!
//! Both are traits so the service can be wired against other backends; the
//! shipped implementations keep everything under the data directory.

pub mod metadata;
pub mod object;

pub use metadata::{FileMetadataStore, MetadataStore};
pub use object::{ImageUpload, LocalObjectStore, ObjectStore};

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Read a JSON document, or `T::default()` if the file does not exist yet.
pub(crate) async fn read_json_or_default<T>(path: &Path) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(io_error(path, e)),
    }
}

/// Serialize to a sibling temp file, then rename over `path`.
///
/// Readers see either the old document or the new one, never a partial write.
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: BTreeMap<String, u32> =
            read_json_or_default(&dir.path().join("absent.json")).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_atomic_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);

        write_json_atomic(&path, &value).await.unwrap();
        let back: BTreeMap<String, u32> = read_json_or_default(&path).await.unwrap();
        assert_eq!(back, value);
        assert!(!dir.path().join("nested").join("doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = read_json_or_default::<BTreeMap<String, u32>>(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
