//! Object storage for uploaded images and thumbnails.
//!
//! Objects are addressed by `local://{bucket}/{key}` URLs with keys of the form
//! `images/{user_id}/{image_id}/original.{ext}` and
//! `images/{user_id}/{image_id}/thumbnail.jpg`. Access URLs are time-limited
//! `file://` URLs carrying a keyed BLAKE3 signature over `path|expires`.

use super::io_error;
use crate::error::StorageError;
use crate::types::StoredImage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};

const LOCAL_SCHEME: &str = "local://";
const FILE_SCHEME: &str = "file://";
const SIGNING_CONTEXT: &str = "captionist 2024-06 access url signing";
const SIGNING_KEY_FILE: &str = ".signing-key";

/// Everything needed to store one upload.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub user_id: &'a str,
    /// Sanitized original bytes
    pub original: &'a [u8],
    /// JPEG thumbnail bytes
    pub thumbnail: &'a [u8],
    pub filename: &'a str,
    pub content_type: &'a str,
    /// Size of the bytes the user uploaded
    pub file_size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an original and its thumbnail under a fresh image id.
    async fn upload(&self, upload: ImageUpload<'_>) -> Result<StoredImage, StorageError>;

    /// Time-limited URL for reading an object. Foreign URLs are returned unchanged.
    fn access_url(&self, storage_url: &str, expiry_secs: u64) -> Result<String, StorageError>;

    /// Delete one object. Returns whether it existed.
    async fn delete(&self, storage_url: &str) -> Result<bool, StorageError>;

    /// Delete every object belonging to a user. Returns the number removed.
    async fn delete_all(&self, user_id: &str) -> Result<usize, StorageError>;
}

/// Reject user ids that could escape the user's key prefix.
pub fn validate_user_id(user_id: &str) -> Result<(), StorageError> {
    let bad = user_id.is_empty()
        || user_id.contains('/')
        || user_id.contains('\\')
        || user_id.contains("..")
        || user_id.contains('\0');
    if bad {
        Err(StorageError::InvalidUserId(user_id.to_string()))
    } else {
        Ok(())
    }
}

/// User id encoded in an object URL of the form `scheme://bucket/images/{user}/...`.
pub fn key_owner(storage_url: &str) -> Option<&str> {
    let (_, rest) = storage_url.split_once("://")?;
    let (_, key) = rest.split_once('/')?;
    let mut segments = key.split('/');
    match (segments.next(), segments.next()) {
        (Some("images"), Some(user)) if !user.is_empty() => Some(user),
        _ => None,
    }
}

/// Extension taken from the original filename, `jpg` when absent or odd.
fn extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ext.to_lowercase()
        }
        _ => "jpg".to_string(),
    }
}

/// Filesystem-backed object store.
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
    signing_key: [u8; 32],
}

impl LocalObjectStore {
    /// Open a store rooted at `root`.
    ///
    /// Without a configured secret, a random one is created on first use and
    /// kept in `{root}/.signing-key` so URLs stay valid across runs.
    pub async fn open(
        root: impl Into<PathBuf>,
        bucket: &str,
        secret: Option<&str>,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(&root, e))?;

        let material = match secret {
            Some(secret) => secret.to_string(),
            None => load_or_create_secret(&root).await?,
        };

        Ok(Self {
            signing_key: blake3::derive_key(SIGNING_CONTEXT, material.as_bytes()),
            root,
            bucket: bucket.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn storage_url(&self, key: &str) -> String {
        format!("{LOCAL_SCHEME}{}/{key}", self.bucket)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.root.join(&self.bucket), |path, segment| path.join(segment))
    }

    /// Filesystem path for one of our `local://` URLs.
    fn object_path(&self, storage_url: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidUrl(storage_url.to_string());
        let rest = storage_url.strip_prefix(LOCAL_SCHEME).ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        if bucket != self.bucket {
            return Err(invalid());
        }
        if key
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == "..")
        {
            return Err(invalid());
        }
        Ok(self.key_path(key))
    }

    fn sign(&self, path: &str, expires: i64) -> blake3::Hash {
        blake3::keyed_hash(&self.signing_key, format!("{path}|{expires}").as_bytes())
    }

    /// Access URL valid until `now + expiry_secs`.
    pub fn access_url_at(
        &self,
        storage_url: &str,
        expiry_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        if !storage_url.starts_with(LOCAL_SCHEME) {
            return Ok(storage_url.to_string());
        }
        let path = self.object_path(storage_url)?;
        let path = path.to_string_lossy();
        let expires = now
            .timestamp()
            .saturating_add(i64::try_from(expiry_secs).unwrap_or(i64::MAX));
        let signature = self.sign(&path, expires);
        Ok(format!(
            "{FILE_SCHEME}{path}?expires={expires}&signature={}",
            signature.to_hex()
        ))
    }

    /// Check an access URL and return the file it grants.
    pub fn verify_access_url(&self, url: &str) -> Result<PathBuf, StorageError> {
        self.verify_access_url_at(url, Utc::now())
    }

    pub fn verify_access_url_at(
        &self,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidUrl(url.to_string());
        let rest = url.strip_prefix(FILE_SCHEME).ok_or_else(invalid)?;
        let (path, query) = rest.rsplit_once('?').ok_or_else(invalid)?;

        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("signature", v)) => signature = blake3::Hash::from_hex(v).ok(),
                _ => {}
            }
        }
        let (Some(expires), Some(signature)) = (expires, signature) else {
            return Err(invalid());
        };

        // blake3::Hash equality is constant-time.
        if self.sign(path, expires) != signature {
            return Err(StorageError::AccessUrlSignature);
        }
        if now.timestamp() > expires {
            return Err(StorageError::AccessUrlExpired);
        }
        Ok(PathBuf::from(path))
    }

    async fn write_object(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))
    }
}

async fn load_or_create_secret(root: &Path) -> Result<String, StorageError> {
    let path = root.join(SIGNING_KEY_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(secret) if !secret.trim().is_empty() => Ok(secret.trim().to_string()),
        Ok(_) => create_secret(&path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => create_secret(&path).await,
        Err(e) => Err(io_error(&path, e)),
    }
}

async fn create_secret(path: &Path) -> Result<String, StorageError> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    tokio::fs::write(path, &secret)
        .await
        .map_err(|e| io_error(path, e))?;
    tracing::info!(path = %path.display(), "Created access URL signing key");
    Ok(secret)
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, upload: ImageUpload<'_>) -> Result<StoredImage, StorageError> {
        validate_user_id(upload.user_id)?;

        let image_id = uuid::Uuid::new_v4().to_string();
        let prefix = format!("images/{}/{image_id}", upload.user_id);
        let original_key = format!("{prefix}/original.{}", extension(upload.filename));
        let thumbnail_key = format!("{prefix}/thumbnail.jpg");

        self.write_object(&original_key, upload.original).await?;
        self.write_object(&thumbnail_key, upload.thumbnail).await?;

        tracing::debug!(user_id = upload.user_id, image_id = %image_id, "Stored image");

        Ok(StoredImage {
            image_id,
            storage_url: self.storage_url(&original_key),
            thumbnail_url: self.storage_url(&thumbnail_key),
            original_filename: upload.filename.to_string(),
            file_size: upload.file_size,
            content_type: upload.content_type.to_string(),
        })
    }

    fn access_url(&self, storage_url: &str, expiry_secs: u64) -> Result<String, StorageError> {
        self.access_url_at(storage_url, expiry_secs, Utc::now())
    }

    async fn delete(&self, storage_url: &str) -> Result<bool, StorageError> {
        let path = self.object_path(storage_url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                // Drop the per-image directory once its last object is gone.
                if let Some(parent) = path.parent() {
                    let _ = tokio::fs::remove_dir(parent).await;
                }
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn delete_all(&self, user_id: &str) -> Result<usize, StorageError> {
        validate_user_id(user_id)?;
        let dir = self.key_path(&format!("images/{user_id}"));

        tokio::task::spawn_blocking(move || -> Result<usize, StorageError> {
            if !dir.exists() {
                return Ok(0);
            }
            let count = walkdir::WalkDir::new(&dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .count();
            std::fs::remove_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
            Ok(count)
        })
        .await
        .map_err(|e| StorageError::Io {
            path: "delete_all".to_string(),
            source: std::io::Error::other(e),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store(dir: &Path) -> LocalObjectStore {
        LocalObjectStore::open(dir.join("objects"), "captionist", Some("test-secret"))
            .await
            .unwrap()
    }

    fn upload<'a>(user_id: &'a str, filename: &'a str) -> ImageUpload<'a> {
        ImageUpload {
            user_id,
            original: b"original-bytes",
            thumbnail: b"thumb-bytes",
            filename,
            content_type: "image/png",
            file_size: 1234,
        }
    }

    #[tokio::test]
    async fn test_upload_layout_and_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let stored = store.upload(upload("user_1", "Photo.PNG")).await.unwrap();
        let prefix = format!("local://captionist/images/user_1/{}", stored.image_id);
        assert_eq!(stored.storage_url, format!("{prefix}/original.png"));
        assert_eq!(stored.thumbnail_url, format!("{prefix}/thumbnail.jpg"));
        assert_eq!(stored.file_size, 1234);
        assert_eq!(stored.original_filename, "Photo.PNG");

        let on_disk = dir
            .path()
            .join("objects/captionist/images/user_1")
            .join(&stored.image_id)
            .join("original.png");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"original-bytes");
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        assert_eq!(extension("noext"), "jpg");
        assert_eq!(extension("weird.p/g"), "jpg");
        assert_eq!(extension("a.b.JPEG"), "jpeg");
    }

    #[tokio::test]
    async fn test_rejects_path_like_user_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        for bad in ["", "a/b", "..", "x..y", "a\\b"] {
            let err = store.upload(upload(bad, "a.jpg")).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidUserId(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_access_url_verifies_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let stored = store.upload(upload("u1", "a.jpg")).await.unwrap();

        let now = Utc::now();
        let url = store.access_url_at(&stored.storage_url, 60, now).unwrap();
        assert!(url.starts_with("file://"));

        let path = store.verify_access_url_at(&url, now).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"original-bytes");

        let later = now + Duration::seconds(61);
        assert!(matches!(
            store.verify_access_url_at(&url, later),
            Err(StorageError::AccessUrlExpired)
        ));
    }

    #[tokio::test]
    async fn test_tampered_access_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let stored = store.upload(upload("u1", "a.jpg")).await.unwrap();
        let now = Utc::now();
        let url = store.access_url_at(&stored.storage_url, 60, now).unwrap();

        let tampered = url.replace("original.jpg", "thumbnail.jpg");
        assert!(matches!(
            store.verify_access_url_at(&tampered, now),
            Err(StorageError::AccessUrlSignature)
        ));

        let (base, _) = url.split_once("expires=").unwrap();
        let forged = format!("{base}expires=99999999999&signature={}", "0".repeat(64));
        assert!(matches!(
            store.verify_access_url_at(&forged, now),
            Err(StorageError::AccessUrlSignature)
        ));
    }

    #[tokio::test]
    async fn test_foreign_urls_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        assert_eq!(
            store.access_url("s3://bucket/key", 60).unwrap(),
            "s3://bucket/key"
        );
        assert!(store
            .access_url("local://other-bucket/images/u/x/original.jpg", 60)
            .is_err());
        assert!(store
            .access_url("local://captionist/images/../secret", 60)
            .is_err());
    }

    #[tokio::test]
    async fn test_generated_secret_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let a = LocalObjectStore::open(dir.path(), "b", None).await.unwrap();
        let b = LocalObjectStore::open(dir.path(), "b", None).await.unwrap();
        assert_eq!(a.signing_key, b.signing_key);
        assert!(dir.path().join(SIGNING_KEY_FILE).exists());
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let first = store.upload(upload("u1", "a.jpg")).await.unwrap();
        store.upload(upload("u1", "b.jpg")).await.unwrap();
        store.upload(upload("u2", "c.jpg")).await.unwrap();

        assert!(store.delete(&first.storage_url).await.unwrap());
        assert!(!store.delete(&first.storage_url).await.unwrap());

        // one thumbnail left from the first upload, two objects from the second
        assert_eq!(store.delete_all("u1").await.unwrap(), 3);
        assert_eq!(store.delete_all("u1").await.unwrap(), 0);
        assert_eq!(store.delete_all("u2").await.unwrap(), 2);
    }

    #[test]
    fn test_key_owner() {
        assert_eq!(
            key_owner("local://captionist/images/user_1/abc/original.jpg"),
            Some("user_1")
        );
        assert_eq!(key_owner("s3://bucket/images/u2/x/thumbnail.jpg"), Some("u2"));
        assert_eq!(key_owner("local://captionist/other/u1/x"), None);
        assert_eq!(key_owner("not a url"), None);
    }
}
