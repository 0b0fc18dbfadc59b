//! Caption record storage.
//!
//! History is returned newest first. Page tokens are opaque base64 strings
//! encoding the last returned `(timestamp, image_id)`; the next page starts
//! strictly after it.

use super::{read_json_or_default, write_json_atomic};
use crate::error::StorageError;
use crate::types::{CaptionRecord, HistoryPage, UsageStats};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record, replacing any record with the same image id.
    async fn save(&self, record: CaptionRecord) -> Result<(), StorageError>;

    /// One page of a user's records, newest first.
    async fn query_history(
        &self,
        user_id: &str,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<HistoryPage, StorageError>;

    async fn get(&self, image_id: &str) -> Result<Option<CaptionRecord>, StorageError>;

    /// Remove all of a user's records. Returns how many were removed.
    async fn delete_all(&self, user_id: &str) -> Result<usize, StorageError>;

    /// Remove and return every record older than `cutoff`.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CaptionRecord>, StorageError>;

    async fn stats(&self) -> Result<UsageStats, StorageError>;
}

/// Exclusive start key for history paging.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct PageKey {
    ts: DateTime<Utc>,
    id: String,
}

impl PageKey {
    fn of(record: &CaptionRecord) -> Self {
        Self {
            ts: record.timestamp,
            id: record.image_id.clone(),
        }
    }

    fn encode(&self) -> String {
        // Serializing two plain fields cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    fn decode(token: &str) -> Result<Self, StorageError> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| StorageError::InvalidPageToken)?;
        serde_json::from_slice(&bytes).map_err(|_| StorageError::InvalidPageToken)
    }

    fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.ts, &self.id)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CaptionTable {
    #[serde(default)]
    records: Vec<CaptionRecord>,
}

impl CaptionTable {
    /// Write `records` to disk and only then make them the in-memory table.
    async fn commit(
        &mut self,
        path: &Path,
        records: Vec<CaptionRecord>,
    ) -> Result<(), StorageError> {
        let next = CaptionTable { records };
        write_json_atomic(path, &next).await?;
        *self = next;
        Ok(())
    }
}

/// All records in one JSON file, rewritten atomically on every change.
pub struct FileMetadataStore {
    path: PathBuf,
    table: Mutex<CaptionTable>,
}

impl FileMetadataStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let table: CaptionTable = read_json_or_default(&path).await?;
        tracing::debug!(path = %path.display(), records = table.records.len(), "Opened caption store");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn save(&self, record: CaptionRecord) -> Result<(), StorageError> {
        let mut table = self.table.lock().await;
        let mut records: Vec<CaptionRecord> = table
            .records
            .iter()
            .filter(|r| r.image_id != record.image_id)
            .cloned()
            .collect();
        records.push(record);
        table.commit(&self.path, records).await
    }

    async fn query_history(
        &self,
        user_id: &str,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<HistoryPage, StorageError> {
        let start = page_token.map(PageKey::decode).transpose()?;
        let table = self.table.lock().await;

        let mut records: Vec<&CaptionRecord> = table
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match &start {
                Some(key) => (r.timestamp, r.image_id.as_str()) < key.sort_key(),
                None => true,
            })
            .collect();
        records.sort_by(|a, b| (b.timestamp, &b.image_id).cmp(&(a.timestamp, &a.image_id)));

        let has_more = records.len() > limit;
        let page: Vec<CaptionRecord> = records.into_iter().take(limit).cloned().collect();
        let next_page_token = match page.last() {
            Some(last) if has_more => Some(PageKey::of(last).encode()),
            _ => None,
        };

        Ok(HistoryPage {
            records: page,
            next_page_token,
        })
    }

    async fn get(&self, image_id: &str) -> Result<Option<CaptionRecord>, StorageError> {
        let table = self.table.lock().await;
        Ok(table.records.iter().find(|r| r.image_id == image_id).cloned())
    }

    async fn delete_all(&self, user_id: &str) -> Result<usize, StorageError> {
        let mut table = self.table.lock().await;
        let kept: Vec<CaptionRecord> = table
            .records
            .iter()
            .filter(|r| r.user_id != user_id)
            .cloned()
            .collect();
        let removed = table.records.len() - kept.len();
        if removed > 0 {
            table.commit(&self.path, kept).await?;
        }
        Ok(removed)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CaptionRecord>, StorageError> {
        let mut table = self.table.lock().await;
        let (expired, kept): (Vec<_>, Vec<_>) = table
            .records
            .iter()
            .cloned()
            .partition(|r| r.timestamp < cutoff);
        if !expired.is_empty() {
            table.commit(&self.path, kept).await?;
        }
        Ok(expired)
    }

    async fn stats(&self) -> Result<UsageStats, StorageError> {
        let table = self.table.lock().await;
        let users: HashSet<&str> = table.records.iter().map(|r| r.user_id.as_str()).collect();
        Ok(UsageStats {
            total_captions: table.records.len(),
            total_users: users.len(),
        })
    }
}
