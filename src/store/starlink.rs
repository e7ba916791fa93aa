// src/store/starlink.rs
//! Starlink cache. Single-process only: access is serialized by an in-process
//! mutex instead of the sentinel lock, writes stay atomic. Records match on
//! id or link.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{
    atomic_write, ensure_dir, read_collection, read_for_update, render, retain_most_recent, select,
    stats_of,
    upsert_by_id_or_link, BulkOutcome, CategoryCount, Collection, UpdateSink, UpdateStats,
    DEFAULT_MAX_RECORDS,
};
use crate::ingest::types::{Topic, Update};

#[derive(Debug)]
pub struct StarlinkStore {
    dir: PathBuf,
    path: PathBuf,
    max_records: usize,
    gate: Mutex<()>,
}

impl StarlinkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            path: dir.join(Topic::Starlink.cache_file()),
            dir,
            max_records: DEFAULT_MAX_RECORDS,
            gate: Mutex::new(()),
        }
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Collection {
        let _g = self.gate.lock().await;
        read_collection(&self.path).await
    }

    async fn write(&self, data: &Collection) -> bool {
        if let Err(e) = ensure_dir(&self.dir).await {
            warn!(target: "store", dir = %self.dir.display(), error = %e, "cannot create data dir");
            return false;
        }
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

    /// Upsert one record.
    pub async fn save_update(&self, update: Update) -> bool {
        self.save_updates(vec![update]).await.is_some()
    }

    /// Upsert a batch and cap to the most recent `max_records`.
    pub async fn save_updates(&self, updates: Vec<Update>) -> Option<BulkOutcome> {
        let _g = self.gate.lock().await;
        let mut data = read_for_update(&self.path).await?;
        let outcome = upsert_by_id_or_link(&mut data.updates, updates, Utc::now());
        let evicted = retain_most_recent(&mut data.updates, self.max_records);
        if !self.write(&data).await {
            return None;
        }
        info!(
            target: "store",
            path = %self.path.display(),
            added = outcome.added,
            updated = outcome.updated,
            evicted,
            "starlink save"
        );
        Some(outcome)
    }

    pub async fn get_all(&self) -> Vec<Update> {
        select(&self.load().await.updates, None, None)
    }

    pub async fn get_latest(&self, limit: usize) -> Vec<Update> {
        select(&self.load().await.updates, None, Some(limit))
    }

    pub async fn get_by_category(&self, category: &str, limit: Option<usize>) -> Vec<Update> {
        select(&self.load().await.updates, Some(category), limit)
    }

    pub async fn stats(&self) -> UpdateStats {
        stats_of(&self.load().await)
    }

    /// Category histogram, most populated first (ties by name).
    pub async fn categories(&self) -> Vec<CategoryCount> {
        let mut out: Vec<CategoryCount> = self
            .stats()
            .await
            .by_category
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        out
    }

    pub async fn clear(&self) -> bool {
        let _g = self.gate.lock().await;
        self.write(&Collection::default()).await
    }
}

#[async_trait]
impl UpdateSink for StarlinkStore {
    async fn save_bulk(&self, updates: Vec<Update>) -> Option<BulkOutcome> {
        self.save_updates(updates).await
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn upd(title: &str, cat: &str, hours_ago: i64) -> Update {
        Update::new(
            title,
            format!("https://x/{title}"),
            Utc::now() - Duration::hours(hours_ago),
            cat,
        )
    }

    #[tokio::test]
    async fn single_and_batch_saves_merge() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StarlinkStore::new(tmp.path());
        assert!(store.save_update(upd("a", "launch", 2)).await);
        let out = store
            .save_updates(vec![upd("a", "launch", 2), upd("b", "satellite", 1)])
            .await
            .unwrap();
        assert_eq!(out, BulkOutcome { added: 1, updated: 1 });

        let all = store.get_all().await;
        assert_eq!(all.iter().map(|u| u.title.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(store.get_by_category("launch", None).await.len(), 1);
        assert_eq!(store.get_latest(1).await[0].title, "b");
    }

    #[tokio::test]
    async fn categories_sorted_by_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StarlinkStore::new(tmp.path());
        store
            .save_updates(vec![
                upd("a", "launch", 1),
                upd("b", "satellite", 2),
                upd("c", "satellite", 3),
                upd("d", "space", 4),
            ])
            .await
            .unwrap();
        let cats = store.categories().await;
        assert_eq!(cats[0], CategoryCount { category: "satellite".into(), count: 2 });
        assert_eq!(cats[1].category, "launch");
        assert_eq!(cats[2].category, "space");
    }

    #[tokio::test]
    async fn xss_coverage_does_not_wipe_the_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StarlinkStore::new(tmp.path());
        store
            .save_updates(vec![upd("a", "launch", 2), upd("b", "space", 1)])
            .await
            .unwrap();
        let mut hostile = upd("c", "space", 0);
        hostile.description = "Ground terminal panel hit by onerror= and javascript: payloads".into();
        assert!(store.save_update(hostile).await);

        assert_eq!(store.stats().await.total, 3);
        let c = store.get_latest(1).await.remove(0);
        assert_eq!(c.description, "Ground terminal panel hit by onerror and javascript payloads");
    }

    #[tokio::test]
    async fn capped_and_clearable() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StarlinkStore::new(tmp.path()).with_max_records(2);
        store
            .save_updates(vec![upd("old", "space", 10), upd("mid", "space", 5), upd("new", "space", 1)])
            .await
            .unwrap();
        let titles: Vec<_> = store.get_all().await.into_iter().map(|u| u.title).collect();
        assert_eq!(titles, vec!["new", "mid"]);

        assert!(store.clear().await);
        assert_eq!(store.stats().await.total, 0);
    }
}
