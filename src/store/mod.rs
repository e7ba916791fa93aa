// src/store/mod.rs
//! Flat-file JSON persistence shared by both store flavours: document shape,
//! load-time validation, upsert/retention rules and atomic writes.

pub mod flat_file;
pub mod lock;
pub mod starlink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::ingest::types::{update_id, Update};

pub use flat_file::{FlatFileStore, StoreOptions};
pub use lock::{FileLock, LockGuard, LockOptions};
pub use starlink::StarlinkStore;

pub const STORE_VERSION: &str = "1.0";
pub const DEFAULT_MAX_RECORDS: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not acquire lock {} within {waited_ms} ms", .path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn default_version() -> String {
    STORE_VERSION.to_string()
}

/// On-disk document: `{ updates, lastUpdated, total?, version }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    #[serde(default)]
    pub updates: Vec<Update>,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            updates: Vec::new(),
            last_updated: None,
            total: None,
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Where a refresh run deposits its results.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Upsert a batch; `None` on failure (already logged).
    async fn save_bulk(&self, updates: Vec<Update>) -> Option<BulkOutcome>;
    fn name(&self) -> String;
}

pub fn stats_of(c: &Collection) -> UpdateStats {
    let mut by_category = BTreeMap::new();
    for u in &c.updates {
        *by_category.entry(u.category.clone()).or_insert(0) += 1;
    }
    UpdateStats {
        total: c.updates.len(),
        by_category,
        last_updated: c.last_updated,
    }
}

/// Newest first, optional category filter (case-insensitive), optional limit.
pub fn select(updates: &[Update], category: Option<&str>, limit: Option<usize>) -> Vec<Update> {
    let mut out: Vec<Update> = updates
        .iter()
        .filter(|u| category.map_or(true, |c| u.category.eq_ignore_ascii_case(c)))
        .cloned()
        .collect();
    crate::ingest::sort_newest_first(&mut out);
    if let Some(n) = limit {
        out.truncate(n);
    }
    out
}

/// Merge `incoming` into `existing`. A record matches on equal title OR equal
/// (non-empty) link; matches keep their id and `created_at`, everything else is
/// refreshed. Unmatched records get an id if missing and are appended.
pub fn upsert_into(existing: &mut Vec<Update>, incoming: Vec<Update>, now: DateTime<Utc>) -> BulkOutcome {
    upsert_by(existing, incoming, now, |e, u| {
        e.title == u.title || (!u.link.is_empty() && e.link == u.link)
    })
}

/// Starlink flavour: match on equal id OR equal (non-empty) link.
pub fn upsert_by_id_or_link(
    existing: &mut Vec<Update>,
    incoming: Vec<Update>,
    now: DateTime<Utc>,
) -> BulkOutcome {
    upsert_by(existing, incoming, now, |e, u| {
        (!u.id.is_empty() && e.id == u.id) || (!u.link.is_empty() && e.link == u.link)
    })
}

fn upsert_by(
    existing: &mut Vec<Update>,
    incoming: Vec<Update>,
    now: DateTime<Utc>,
    same: impl Fn(&Update, &Update) -> bool,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for mut u in incoming {
        if !defang_update(&mut u) {
            warn!(target: "store", link = %u.link, "dropping record with a script link");
            continue;
        }
        let hit = existing.iter().position(|e| same(e, &u));
        match hit {
            Some(idx) => {
                let prev = &existing[idx];
                u.id = prev.id.clone();
                u.created_at = prev.created_at.or(u.created_at).or(Some(now));
                u.updated_at = Some(now);
                existing[idx] = u;
                outcome.updated += 1;
            }
            None => {
                if u.id.trim().is_empty() {
                    u.id = update_id(&u.title, &u.link);
                }
                u.created_at = u.created_at.or(Some(now));
                u.updated_at = Some(now);
                existing.push(u);
                outcome.added += 1;
            }
        }
    }
    outcome
}

/// Keep the `cap` most recent by `published_date`. Returns how many were evicted.
pub fn retain_most_recent(updates: &mut Vec<Update>, cap: usize) -> usize {
    if updates.len() <= cap {
        return 0;
    }
    crate::ingest::sort_newest_first(updates);
    let evicted = updates.len() - cap;
    updates.truncate(cap);
    evicted
}

static RE_DANGEROUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<script|javascript:|\bon(?:error|load|click|mouseover|focus|blur|submit|change)\s*=")
        .unwrap()
});

/// Neutralise whatever [`validate_document`] would flag by dropping the
/// trigger characters (`<script` → `script`, `onerror=` → `onerror`).
pub fn defang(text: &str) -> String {
    let mut out = text.to_string();
    // each pass removes at least one character, so this terminates
    while RE_DANGEROUS.is_match(&out) {
        out = RE_DANGEROUS
            .replace_all(&out, |caps: &regex::Captures| {
                caps[0].chars().filter(|c| c.is_alphanumeric()).collect::<String>()
            })
            .into_owned();
    }
    out
}

fn defang_opt(field: &mut Option<String>) {
    if let Some(v) = field.as_mut() {
        *v = defang(v);
    }
}

/// Make a record safe to persist. `false` when the link itself is a script
/// URL; such a record has nothing worth keeping.
pub fn defang_update(u: &mut Update) -> bool {
    if RE_DANGEROUS.is_match(&u.link) {
        return false;
    }
    u.id = defang(&u.id);
    u.title = defang(&u.title);
    u.description = defang(&u.description);
    u.category = defang(&u.category);
    u.source = defang(&u.source);
    for t in u.tags.iter_mut() {
        *t = defang(t);
    }
    for f in [
        &mut u.version,
        &mut u.kb_number,
        &mut u.severity,
        &mut u.service_type,
        &mut u.cloud_provider,
        &mut u.mission,
    ] {
        defang_opt(f);
    }
    true
}

/// Parse and vet a stored document. `Err` carries a short reason for the log.
pub fn validate_document(raw: &str) -> Result<Collection, String> {
    if RE_DANGEROUS.is_match(raw) {
        return Err("suspicious content".into());
    }
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| format!("not json: {e}"))?;
    let updates = value
        .get("updates")
        .and_then(|u| u.as_array())
        .ok_or_else(|| "updates is not a list".to_string())?;
    for (i, item) in updates.iter().enumerate() {
        for key in ["title", "link", "id"] {
            if !item.get(key).is_some_and(|v| v.is_string()) {
                return Err(format!("item {i} lacks {key}"));
            }
        }
    }
    serde_json::from_value(value).map_err(|e| format!("shape: {e}"))
}

/// Missing or blank files are an empty collection; `Err` means a file is there
/// but could not be read or failed validation.
async fn load_checked(path: &Path) -> Result<Collection, String> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Collection::default()),
        Err(e) => return Err(format!("unreadable: {e}")),
    };
    if raw.trim().is_empty() {
        return Ok(Collection::default());
    }
    validate_document(&raw)
}

/// Validated read; anything missing, corrupt or suspicious reads as empty.
pub(crate) async fn read_collection(path: &Path) -> Collection {
    load_checked(path).await.unwrap_or_else(|reason| {
        warn!(target: "store", path = %path.display(), %reason, "store failed validation, using empty collection");
        Collection::default()
    })
}

/// Read ahead of a read-modify-write. A rejected file is renamed to
/// `<name>.rejected-<utc stamp>` before the caller may write; `None` when it
/// cannot be moved, so the caller must not overwrite it.
pub(crate) async fn read_for_update(path: &Path) -> Option<Collection> {
    let reason = match load_checked(path).await {
        Ok(c) => return Some(c),
        Err(reason) => reason,
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store.json".to_string());
    let aside = path.with_file_name(format!(
        "{}.rejected-{}",
        file_name,
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));
    match tokio::fs::rename(path, &aside).await {
        Ok(()) => {
            warn!(target: "store", path = %path.display(), moved_to = %aside.display(), %reason, "rejected store moved aside, starting empty");
            Some(Collection::default())
        }
        Err(e) => {
            warn!(target: "store", path = %path.display(), %reason, error = %e, "rejected store could not be moved aside, not overwriting");
            None
        }
    }
}

/// Create the data directory on first use, owner-only where the platform allows.
pub(crate) async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await?;
    restrict_permissions(dir, 0o700).await;
    Ok(())
}

#[cfg(unix)]
pub(crate) async fn restrict_permissions(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await {
        warn!(target: "store", path = %path.display(), error = %e, "could not restrict permissions");
    }
}

#[cfg(not(unix))]
pub(crate) async fn restrict_permissions(_path: &Path, _mode: u32) {}

/// Write to a sibling temp file, then rename over the target.
pub(crate) async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store.json".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    restrict_permissions(&tmp, 0o600).await;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Stamp and serialize a collection for writing.
pub(crate) fn render(c: &Collection) -> Result<Vec<u8>, StoreError> {
    let mut doc = c.clone();
    doc.last_updated = Some(Utc::now());
    doc.total = Some(doc.updates.len());
    if doc.version.is_empty() {
        doc.version = default_version();
    }
    Ok(serde_json::to_vec_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn upd(title: &str, link: &str, mins_ago: i64) -> Update {
        Update::new(title, link, Utc::now() - Duration::minutes(mins_ago), "security")
    }

    #[test]
    fn upsert_matches_on_title_or_link() {
        let t0 = Utc::now() - Duration::hours(1);
        let mut store = Vec::new();
        let first = upsert_into(&mut store, vec![upd("A", "https://x/1", 5)], t0);
        assert_eq!(first, BulkOutcome { added: 1, updated: 0 });
        let id = store[0].id.clone();

        let now = Utc::now();
        let out = upsert_into(
            &mut store,
            vec![upd("A renamed", "https://x/1", 1), upd("B", "https://x/2", 1)],
            now,
        );
        assert_eq!(out, BulkOutcome { added: 1, updated: 1 });
        assert_eq!(store.len(), 2);
        assert_eq!(store[0].id, id);
        assert_eq!(store[0].title, "A renamed");
        assert_eq!(store[0].created_at, Some(t0));
        assert_eq!(store[0].updated_at, Some(now));
    }

    #[test]
    fn id_or_link_flavour_ignores_title() {
        let mut store = Vec::new();
        upsert_by_id_or_link(&mut store, vec![upd("A", "https://x/1", 5)], Utc::now());
        let out = upsert_by_id_or_link(&mut store, vec![upd("A", "https://x/2", 1)], Utc::now());
        assert_eq!(out, BulkOutcome { added: 1, updated: 0 });
        let out = upsert_by_id_or_link(&mut store, vec![upd("A again", "https://x/2", 1)], Utc::now());
        assert_eq!(out, BulkOutcome { added: 0, updated: 1 });
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn empty_ids_are_filled() {
        let mut u = upd("A", "https://x/1", 0);
        u.id.clear();
        let mut store = Vec::new();
        upsert_into(&mut store, vec![u], Utc::now());
        assert_eq!(store[0].id, update_id("A", "https://x/1"));
    }

    #[test]
    fn retention_keeps_newest() {
        let mut v: Vec<Update> = (0..10).map(|i| upd(&format!("t{i}"), &format!("l{i}"), i)).collect();
        let evicted = retain_most_recent(&mut v, 3);
        assert_eq!(evicted, 7);
        let titles: Vec<_> = v.iter().map(|u| u.title.as_str()).collect();
        assert_eq!(titles, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn validation_rejects_bad_shapes_and_scripts() {
        assert!(validate_document(r#"{"updates": {}}"#).is_err());
        assert!(validate_document(r#"{"updates": [{"title": "t", "link": "l"}]}"#).is_err());
        let evil = r#"{"updates": [{"id":"1","title":"<script>x</script>","link":"l","published_date":"2025-01-01T00:00:00Z","category":"a"}]}"#;
        assert_eq!(validate_document(evil).unwrap_err(), "suspicious content");
        let handler = r#"{"updates": [], "note": "<img onerror = alert(1)>"}"#;
        assert!(validate_document(handler).is_err());
        let ok = r#"{"updates": [{"id":"1","title":"t","link":"l","published_date":"2025-01-01T00:00:00Z","category":"a"}], "lastUpdated": null}"#;
        let c = validate_document(ok).unwrap();
        assert_eq!(c.updates.len(), 1);
        assert_eq!(c.version, STORE_VERSION);
    }

    #[test]
    fn defang_neutralises_every_trigger() {
        let s = "Attackers abuse javascript: URLs, onerror = handlers and <SCRIPT> tags";
        let out = defang(s);
        assert!(!RE_DANGEROUS.is_match(&out));
        assert_eq!(out, "Attackers abuse javascript URLs, onerror handlers and SCRIPT> tags");
        // nested triggers that reappear after one pass
        assert!(!RE_DANGEROUS.is_match(&defang("<<scriptscript javajavascript::")));
        assert_eq!(defang("plain text"), "plain text");
    }

    #[test]
    fn defanged_records_round_trip_through_validation() {
        let mut c = Collection::default();
        let mut u = upd("XSS in <script> handling", "https://x/1", 0);
        u.description = "Attackers abuse javascript: URLs and onerror= handlers".into();
        u.tags = vec!["onload=".into()];
        upsert_into(&mut c.updates, vec![u], Utc::now());
        let raw = serde_json::to_string(&c).unwrap();
        let back = validate_document(&raw).unwrap();
        assert_eq!(back.updates.len(), 1);
        assert_eq!(back.updates[0].title, "XSS in script> handling");
    }

    #[test]
    fn script_links_are_dropped() {
        let mut store = Vec::new();
        let out = upsert_into(
            &mut store,
            vec![upd("bad", "javascript:alert(1)", 0), upd("good", "https://x/2", 0)],
            Utc::now(),
        );
        assert_eq!(out, BulkOutcome { added: 1, updated: 0 });
        assert_eq!(store[0].title, "good");
    }

    #[tokio::test]
    async fn rejected_file_is_moved_aside_before_rewrite() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rss-cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let c = read_for_update(&path).await.unwrap();
        assert!(c.updates.is_empty());
        assert!(!path.exists());
        let moved: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("rss-cache.json.rejected-"))
            .collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(std::fs::read_to_string(moved[0].path()).unwrap(), "{ not json");

        // a missing file is simply empty
        assert!(read_for_update(&path).await.unwrap().updates.is_empty());
    }

    #[test]
    fn stats_group_by_category() {
        let mut c = Collection::default();
        for (t, cat) in [("1", "a"), ("2", "a"), ("3", "b")] {
            c.updates.push(Update::new(t, t, Utc::now(), cat));
        }
        let s = stats_of(&c);
        assert_eq!(s.total, 3);
        assert_eq!(s.by_category.get("a"), Some(&2));
        assert_eq!(s.by_category.get("b"), Some(&1));
    }
}
