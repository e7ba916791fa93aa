// src/ingest/mod.rs
pub mod category;
pub mod extract;
pub mod fetcher;
pub mod providers;
pub mod relevance;
pub mod scheduler;
pub mod tags;
pub mod translate;
pub mod transport;
pub mod types;
pub mod xml;

use crate::ingest::types::Update;
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::HashSet;

/// Dedupe key length, in characters of the lowercased title.
pub const DEDUP_PREFIX_CHARS: usize = 50;

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_total", "Items parsed from upstream feeds.");
        describe_counter!(
            "feed_items_rejected_total",
            "Items dropped by the relevance classifier."
        );
        describe_counter!("feed_dedup_total", "Items collapsed by title-prefix dedupe.");
        describe_counter!(
            "feed_source_errors_total",
            "Source fetch/parse failures (source contributed zero items)."
        );
        describe_counter!("store_saves_total", "Successful store writes.");
        describe_counter!(
            "store_lock_timeouts_total",
            "Store operations failed on lock acquisition."
        );
        describe_counter!("refresh_runs_total", "Fetch-and-save runs per topic.");
        describe_gauge!("feed_last_run_ts", "Unix ts of the last completed fetch run.");
        describe_gauge!("refresh_last_full_ts", "Unix ts of the last scheduled full refresh.");
        describe_gauge!(
            "refresh_last_security_ts",
            "Unix ts of the last scheduled security refresh."
        );
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
/// Markup that was entity-escaped in the feed: a real tag name right after `<`,
/// so comparisons such as `a < b and c > d` survive.
static RE_DECODED_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s+[^<>]*)?/?>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Clean feed text: drop CDATA markers and tags, decode entities, collapse whitespace.
///
/// Never fails; malformed markup degrades to whatever survives the passes.
pub fn clean(raw: &str) -> String {
    // 1) Stray CDATA markers can sit anywhere, not just at the edges
    let out = raw.replace("<![CDATA[", "").replace("]]>", "");

    // 2) Strip markup
    let out = RE_TAGS.replace_all(&out, " ");

    // 3) Entities (named, decimal, hex); escaped markup shows up only now
    let out = html_escape::decode_html_entities(&out);
    let out = RE_DECODED_TAGS.replace_all(&out, " ");

    // 4) Collapse whitespace (\s is Unicode-aware, so NBSP folds too)
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Cap `s` at `max` characters, ending with `...` when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

/// Lowercased first [`DEDUP_PREFIX_CHARS`] characters of a title.
pub fn dedup_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .take(DEDUP_PREFIX_CHARS)
        .collect()
}

/// Sort newest first (stable, so equal timestamps keep source order).
pub fn sort_newest_first(updates: &mut [Update]) {
    updates.sort_by(|a, b| b.published_date.cmp(&a.published_date));
}

/// Drop items whose title prefix was already seen; first occurrence wins.
/// Returns (kept, removed_count).
pub fn dedupe_by_title_prefix(updates: Vec<Update>) -> (Vec<Update>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(updates.len());
    let mut removed = 0usize;
    for u in updates {
        if !seen.insert(dedup_key(&u.title)) {
            removed += 1;
            continue;
        }
        keep.push(u);
    }
    (keep, removed)
}
