// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::category::CategoryRules;
use crate::ingest::relevance::KeywordTiers;
use crate::ingest::translate::PhraseSubstitutionTable;

/// One normalized news item, shared by every topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Update {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
    pub published_date: DateTime<Utc>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: String,

    // Windows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kb_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    // Cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,

    // Starlink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellite_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Update {
    /// Minimal record; topic fields and bookkeeping stamps start empty.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published_date: DateTime<Utc>,
        category: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        Self {
            id: update_id(&title, &link),
            title,
            description: String::new(),
            link,
            published_date,
            category: category.into(),
            tags: Vec::new(),
            source: String::new(),
            version: None,
            kb_number: None,
            severity: None,
            service_type: None,
            cloud_provider: None,
            mission: None,
            satellite_count: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Stable id: first 8 bytes of SHA-256 over `title + link`, hex encoded.
pub fn update_id(title: &str, link: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(link.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Windows,
    Cloud,
    Starlink,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Windows => "windows",
            Topic::Cloud => "cloud",
            Topic::Starlink => "starlink",
        }
    }

    /// Cache file name under the data directory.
    pub fn cache_file(self) -> &'static str {
        match self {
            Topic::Windows => "rss-cache.json",
            Topic::Cloud => "cloud-cache.json",
            Topic::Starlink => "starlink-cache.json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Some(Topic::Windows),
            "cloud" => Some(Topic::Cloud),
            "starlink" => Some(Topic::Starlink),
            _ => None,
        }
    }

    pub fn all() -> [Topic; 3] {
        [Topic::Windows, Topic::Cloud, Topic::Starlink]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

/// A configured upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSource {
    pub key: String,
    pub name: String,
    pub url: String,
    /// Declared category, used when content scoring finds nothing.
    pub category: String,
    #[serde(default)]
    pub language: Language,
    /// Topic-scoped source: items with no keyword hit are still accepted.
    #[serde(default)]
    pub specialized: bool,
    /// Declared cloud provider (Cloud topic only).
    #[serde(default)]
    pub provider: Option<String>,
}

impl FeedSource {
    pub fn new(key: &str, name: &str, url: &str, category: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            language: Language::En,
            specialized: false,
            provider: None,
        }
    }

    pub fn french(mut self) -> Self {
        self.language = Language::Fr;
        self
    }

    pub fn specialized(mut self) -> Self {
        self.specialized = true;
        self
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = Some(provider.to_string());
        self
    }
}

/// Item fields as read from the feed, before cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub content_encoded: Option<String>,
    pub pub_date: Option<String>,
    pub dc_date: Option<String>,
}

/// Everything that makes one topic different from another: keyword tables,
/// category sets, extractors and thresholds. The fetcher is topic-agnostic.
pub trait TopicProfile: Send + Sync {
    fn topic(&self) -> Topic;

    /// Allowed categories, in declaration order.
    fn categories(&self) -> &'static [&'static str];

    /// Category targeted by the security-only refresh, if the topic has one.
    fn security_category(&self) -> Option<&'static str> {
        None
    }

    fn max_description_len(&self) -> usize;

    /// Distinct French indicators needed before text counts as French.
    fn french_threshold(&self) -> usize;

    fn keywords(&self) -> &KeywordTiers;

    fn category_rules(&self) -> &CategoryRules;

    fn phrase_table(&self) -> &PhraseSubstitutionTable;

    fn tag_table(&self) -> &'static [(&'static str, &'static [&'static str])];

    /// Fill the topic-specific optional fields from the cleaned text.
    fn extract_metadata(&self, text: &str, source: &FeedSource, update: &mut Update);

    fn default_sources(&self) -> Vec<FeedSource>;

    /// Declared category if allowed, else the first allowed category.
    fn fallback_category(&self, source: &FeedSource) -> &'static str {
        let cats = self.categories();
        cats.iter()
            .copied()
            .find(|c| c.eq_ignore_ascii_case(&source.category))
            .unwrap_or(cats[0])
    }
}
