// src/ingest/fetcher.rs
//! Topic-agnostic feed fetcher.
//!
//! Per item: clean → relevance gate → category → metadata → (translate) → tags.
//! Sources are fetched one after another with a fixed pause between requests;
//! a failing source contributes zero items and never fails the batch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ingest::tags::generate_tags;
use crate::ingest::transport::FeedTransport;
use crate::ingest::translate::{is_french_content, PhraseSubstitutionTable};
use crate::ingest::types::{FeedSource, Language, RawItem, Topic, TopicProfile, Update};
use crate::ingest::{
    clean, dedupe_by_title_prefix, ensure_metrics_described, sort_newest_first, truncate_chars,
    xml,
};

pub const DEFAULT_INTER_REQUEST_DELAY: Duration = Duration::from_millis(1000);

/// Parse RFC 2822 / RFC 3339 and a few loose layouts; `fallback` otherwise.
pub fn parse_feed_date(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let s = raw.trim();
    if s.is_empty() {
        return fallback;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S %z", "%a, %d %b %Y %H:%M %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return dt.with_timezone(&Utc);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return dt.and_utc();
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(fallback)
}

pub struct FeedFetcher {
    profile: Arc<dyn TopicProfile>,
    transport: Arc<dyn FeedTransport>,
    sources: Vec<FeedSource>,
    delay: Duration,
}

impl FeedFetcher {
    /// Fetcher over the profile's built-in sources with the default pause.
    pub fn new(profile: Arc<dyn TopicProfile>, transport: Arc<dyn FeedTransport>) -> Self {
        let sources = profile.default_sources();
        Self {
            profile,
            transport,
            sources,
            delay: DEFAULT_INTER_REQUEST_DELAY,
        }
    }

    pub fn with_sources(mut self, sources: Vec<FeedSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn topic(&self) -> Topic {
        self.profile.topic()
    }

    pub fn profile(&self) -> &dyn TopicProfile {
        self.profile.as_ref()
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Fetch one configured source by key. Unknown keys yield nothing.
    pub async fn fetch_feed(&self, source_key: &str) -> Vec<Update> {
        match self.sources.iter().find(|s| s.key == source_key) {
            Some(src) => self.fetch_source(src).await,
            None => {
                warn!(target: "ingest", topic = self.topic().as_str(), source = source_key, "unknown feed source");
                Vec::new()
            }
        }
    }

    /// GET + parse one source. Every failure is logged and yields an empty list.
    pub async fn fetch_source(&self, source: &FeedSource) -> Vec<Update> {
        ensure_metrics_described();
        let topic = self.topic().as_str();

        let resp = match self.transport.get(&source.url).await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "ingest", topic, source = %source.key, error = ?e, "feed fetch failed");
                counter!("feed_source_errors_total", "topic" => topic).increment(1);
                return Vec::new();
            }
        };
        if !resp.is_success() {
            warn!(target: "ingest", topic, source = %source.key, status = resp.status, "feed answered non-2xx");
            counter!("feed_source_errors_total", "topic" => topic).increment(1);
            return Vec::new();
        }

        let out = self.parse_feed(&resp.body, source, Utc::now());
        info!(target: "ingest", topic, source = %source.key, kept = out.len(), "feed fetched");
        out
    }

    /// Turn a feed document into updates; `now` stands in for missing dates.
    pub fn parse_feed(&self, body: &str, source: &FeedSource, now: DateTime<Utc>) -> Vec<Update> {
        let topic = self.topic().as_str();
        let raw_items = xml::parse_items(body);
        counter!("feed_items_total", "topic" => topic).increment(raw_items.len() as u64);

        let mut out = Vec::with_capacity(raw_items.len());
        let mut rejected = 0u64;
        for raw in raw_items {
            match self.build_update(raw, source, now) {
                Some(u) => out.push(u),
                None => rejected += 1,
            }
        }
        if rejected > 0 {
            counter!("feed_items_rejected_total", "topic" => topic).increment(rejected);
            debug!(target: "ingest", topic, source = %source.key, rejected, "items dropped");
        }
        out
    }

    fn build_update(&self, raw: RawItem, source: &FeedSource, now: DateTime<Utc>) -> Option<Update> {
        let p = self.profile.as_ref();

        let title = clean(raw.title.as_deref().unwrap_or_default());
        let link = clean(raw.link.as_deref().unwrap_or_default());
        if title.is_empty() || link.is_empty() {
            debug!(target: "ingest", source = %source.key, "item without title or link");
            return None;
        }
        let description = clean(
            raw.description
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .or(raw.content_encoded.as_deref())
                .unwrap_or_default(),
        );
        let published = raw
            .pub_date
            .as_deref()
            .or(raw.dc_date.as_deref())
            .map(|d| parse_feed_date(d, now))
            .unwrap_or(now);

        let verdict = p.keywords().evaluate(&title, &description, source);
        if !verdict.accepted() {
            debug!(target: "ingest", source = %source.key, ?verdict, "item not relevant");
            return None;
        }

        let category = p
            .category_rules()
            .detect(&title, &description)
            .unwrap_or_else(|| p.fallback_category(source));

        let original_text = format!("{} {}", title, description);
        let (title, description) = self.localize(source, &original_text, title, description);
        let description = truncate_chars(&description, p.max_description_len());

        let mut update = Update::new(title, link, published, category);
        update.description = description;
        update.source = source.name.clone();
        p.extract_metadata(&original_text, source, &mut update);
        update.tags = generate_tags(p.tag_table(), &update.title, &update.description, category);
        Some(update)
    }

    /// English sources whose text does not already read as French go through
    /// the phrase table; everything else passes through.
    fn localize(
        &self,
        source: &FeedSource,
        combined: &str,
        title: String,
        description: String,
    ) -> (String, String) {
        let p = self.profile.as_ref();
        if source.language == Language::Fr || is_french_content(combined, p.french_threshold()) {
            return (title, description);
        }
        let table: &PhraseSubstitutionTable = p.phrase_table();
        (table.apply(&title), table.apply(&description))
    }

    /// All sources in configured order, newest first, title-prefix deduped.
    pub async fn fetch_all_feeds(&self) -> Vec<Update> {
        self.fetch_many(self.sources.iter().collect()).await
    }

    /// Only sources declared under the topic's security category, keeping items
    /// categorised as security. Topics without one yield nothing.
    pub async fn fetch_security_feeds(&self) -> Vec<Update> {
        let Some(sec) = self.profile.security_category() else {
            return Vec::new();
        };
        let sources = self
            .sources
            .iter()
            .filter(|s| s.category.eq_ignore_ascii_case(sec))
            .collect();
        let mut out = self.fetch_many(sources).await;
        out.retain(|u| u.category == sec);
        out
    }

    async fn fetch_many(&self, sources: Vec<&FeedSource>) -> Vec<Update> {
        ensure_metrics_described();
        let topic = self.topic().as_str();

        let mut all = Vec::new();
        for (i, src) in sources.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            all.extend(self.fetch_source(src).await);
        }

        sort_newest_first(&mut all);
        let (kept, removed) = dedupe_by_title_prefix(all);
        counter!("feed_dedup_total", "topic" => topic).increment(removed as u64);
        gauge!("feed_last_run_ts", "topic" => topic).set(Utc::now().timestamp() as f64);

        info!(
            target: "ingest",
            topic,
            sources = sources.len(),
            kept = kept.len(),
            dedup = removed,
            "fetch run finished"
        );
        kept
    }
}
