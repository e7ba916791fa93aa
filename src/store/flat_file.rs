// src/store/flat_file.rs
//! Locked JSON store (Windows and Cloud caches).
//!
//! Every read and write runs under the advisory [`FileLock`], so access is fully
//! serialized. Writes are atomic (temp file + rename); loads are validated and
//! fall back to an empty collection.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{
    atomic_write, ensure_dir, read_collection, read_for_update, render, retain_most_recent, select,
    stats_of,
    upsert_into, BulkOutcome, Collection, FileLock, LockOptions, StoreError, UpdateSink,
    UpdateStats, DEFAULT_MAX_RECORDS,
};
use crate::ingest::types::{Topic, Update};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub dir: PathBuf,
    pub file_name: String,
    pub max_records: usize,
    pub lock: LockOptions,
}

impl StoreOptions {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            lock: LockOptions::default(),
        }
    }

    pub fn for_topic(dir: impl Into<PathBuf>, topic: Topic) -> Self {
        Self::new(dir, topic.cache_file())
    }
}

#[derive(Debug)]
pub struct FlatFileStore {
    dir: PathBuf,
    path: PathBuf,
    lock: FileLock,
    max_records: usize,
}

impl FlatFileStore {
    pub fn new(opts: StoreOptions) -> Self {
        let path = opts.dir.join(&opts.file_name);
        let lock_path = opts.dir.join(format!("{}.lock", opts.file_name));
        Self {
            lock: FileLock::new(lock_path, opts.lock),
            dir: opts.dir,
            path,
            max_records: opts.max_records.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The store's lock, for callers that must hold it across several steps.
    pub fn lock(&self) -> &FileLock {
        &self.lock
    }

    async fn guarded(&self) -> Result<super::LockGuard, StoreError> {
        ensure_dir(&self.dir).await?;
        self.lock.acquire().await
    }

    pub async fn load_data(&self) -> Result<Collection, StoreError> {
        let guard = self.guarded().await?;
        let data = read_collection(&self.path).await;
        guard.release().await;
        Ok(data)
    }

    /// `Err` only when the lock cannot be taken; a failed write is `Ok(false)`.
    pub async fn save_data(&self, data: &Collection) -> Result<bool, StoreError> {
        let guard = self.guarded().await?;
        let ok = self.write_unlocked(data).await;
        guard.release().await;
        Ok(ok)
    }

    async fn write_unlocked(&self, data: &Collection) -> bool {
        let bytes = match render(data) {
            Ok(b) => b,
            Err(e) => {
                warn!(target: "store", path = %self.path.display(), error = %e, "serialize failed");
                return false;
            }
        };
        match atomic_write(&self.path, &bytes).await {
            Ok(()) => {
                counter!("store_saves_total").increment(1);
                true
            }
            Err(e) => {
                warn!(target: "store", path = %self.path.display(), error = %e, "write failed");
                false
            }
        }
    }

    async fn try_save_bulk(&self, updates: Vec<Update>) -> Result<Option<BulkOutcome>, StoreError> {
        let guard = self.guarded().await?;
        let Some(mut data) = read_for_update(&self.path).await else {
            guard.release().await;
            return Ok(None);
        };
        let outcome = upsert_into(&mut data.updates, updates, Utc::now());
        let evicted = retain_most_recent(&mut data.updates, self.max_records);
        let ok = self.write_unlocked(&data).await;
        guard.release().await;

        if !ok {
            return Ok(None);
        }
        info!(
            target: "store",
            path = %self.path.display(),
            added = outcome.added,
            updated = outcome.updated,
            evicted,
            total = data.updates.len(),
            "bulk save"
        );
        Ok(Some(outcome))
    }

    /// Upsert a batch (title OR link match), then cap to the most recent
    /// `max_records`. `None` on any failure, lock timeout included.
    pub async fn save_bulk(&self, updates: Vec<Update>) -> Option<BulkOutcome> {
        match self.try_save_bulk(updates).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "store", path = %self.path.display(), error = %e, "bulk save failed");
                None
            }
        }
    }

    /// Newest first, optionally filtered by category and capped at `limit`.
    pub async fn get_updates(
        &self,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Update>, StoreError> {
        let data = self.load_data().await?;
        Ok(select(&data.updates, category, limit))
    }

    pub async fn get_latest(&self, limit: usize) -> Result<Vec<Update>, StoreError> {
        self.get_updates(None, Some(limit)).await
    }

    pub async fn stats(&self) -> Result<UpdateStats, StoreError> {
        let data = self.load_data().await?;
        Ok(stats_of(&data))
    }

    /// Drop every record.
    pub async fn clear(&self) -> Result<bool, StoreError> {
        self.save_data(&Collection::default()).await
    }
}

#[async_trait]
impl UpdateSink for FlatFileStore {
    async fn save_bulk(&self, updates: Vec<Update>) -> Option<BulkOutcome> {
        FlatFileStore::save_bulk(self, updates).await
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}
