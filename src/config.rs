// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::scheduler::SchedulerCfg;
use crate::ingest::types::{FeedSource, Topic};
use crate::store::{LockOptions, StoreOptions};

pub const ENV_CONFIG_PATH: &str = "VEILLE_CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "VEILLE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpCfg {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Successful bodies are reused for this long (0 disables the cache).
    pub cache_window_secs: u64,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            user_agent: crate::ingest::transport::DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            cache_window_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchCfg {
    pub delay_ms: u64,
}

impl Default for FetchCfg {
    fn default() -> Self {
        Self { delay_ms: 1000 }
    }
}

/// Per-topic overrides. Unset fields inherit the global values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicCfg {
    pub enabled: bool,
    pub delay_ms: Option<u64>,
    pub cache_window_secs: Option<u64>,
    /// Replaces the built-in source list when non-empty.
    pub sources: Vec<FeedSource>,
}

impl Default for TopicCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: None,
            cache_window_secs: None,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreCfg {
    pub max_records: usize,
    pub lock_timeout_ms: u64,
    pub lock_poll_ms: u64,
    pub stale_lock_secs: u64,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            max_records: crate::store::DEFAULT_MAX_RECORDS,
            lock_timeout_ms: 5000,
            lock_poll_ms: 100,
            stale_lock_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleCfg {
    pub daily_hour: u32,
    pub security_interval_hours: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            daily_hour: 6,
            security_interval_hours: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub http: HttpCfg,
    pub fetch: FetchCfg,
    pub windows: TopicCfg,
    pub cloud: TopicCfg,
    pub starlink: TopicCfg,
    pub store: StoreCfg,
    pub schedule: ScheduleCfg,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            http: HttpCfg::default(),
            fetch: FetchCfg::default(),
            windows: TopicCfg::default(),
            cloud: TopicCfg::default(),
            starlink: TopicCfg::default(),
            store: StoreCfg::default(),
            schedule: ScheduleCfg::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Env var + fallbacks:
    /// 1) $VEILLE_CONFIG_PATH
    /// 2) config/veille.toml
    /// 3) config/veille.json
    /// 4) built-in defaults
    ///
    /// `$VEILLE_DATA_DIR` then overrides `data_dir`.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/veille.toml");
            let json_p = PathBuf::from("config/veille.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                cfg.data_dir = PathBuf::from(dir.trim());
            }
        }
        Ok(cfg)
    }

    fn sanitized(mut self) -> Self {
        if self.http.timeout_secs == 0 {
            self.http.timeout_secs = HttpCfg::default().timeout_secs;
        }
        if self.http.user_agent.trim().is_empty() {
            self.http.user_agent = HttpCfg::default().user_agent;
        }
        if self.store.max_records == 0 {
            self.store.max_records = StoreCfg::default().max_records;
        }
        if self.store.lock_timeout_ms == 0 {
            self.store.lock_timeout_ms = StoreCfg::default().lock_timeout_ms;
        }
        self.store.lock_timeout_ms = self.store.lock_timeout_ms.max(10);
        self.store.lock_poll_ms = self.store.lock_poll_ms.clamp(10, self.store.lock_timeout_ms);
        if self.store.stale_lock_secs == 0 {
            self.store.stale_lock_secs = StoreCfg::default().stale_lock_secs;
        }
        self.schedule.daily_hour = self.schedule.daily_hour.min(23);
        self.schedule.security_interval_hours = self.schedule.security_interval_hours.max(1);
        for t in [&mut self.windows, &mut self.cloud, &mut self.starlink] {
            t.sources.retain(|s| !s.key.trim().is_empty() && !s.url.trim().is_empty());
        }
        self
    }

    pub fn topic(&self, topic: Topic) -> &TopicCfg {
        match topic {
            Topic::Windows => &self.windows,
            Topic::Cloud => &self.cloud,
            Topic::Starlink => &self.starlink,
        }
    }

    pub fn delay_for(&self, topic: Topic) -> Duration {
        Duration::from_millis(self.topic(topic).delay_ms.unwrap_or(self.fetch.delay_ms))
    }

    pub fn cache_window_for(&self, topic: Topic) -> Duration {
        Duration::from_secs(
            self.topic(topic)
                .cache_window_secs
                .unwrap_or(self.http.cache_window_secs),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(self.store.lock_timeout_ms),
            poll: Duration::from_millis(self.store.lock_poll_ms),
            stale_after: Duration::from_secs(self.store.stale_lock_secs),
        }
    }

    /// Options for the locked store of `topic` under `data_dir`.
    pub fn store_options(&self, topic: Topic) -> StoreOptions {
        StoreOptions {
            max_records: self.store.max_records,
            lock: self.lock_options(),
            ..StoreOptions::for_topic(&self.data_dir, topic)
        }
    }

    pub fn scheduler(&self) -> SchedulerCfg {
        SchedulerCfg {
            daily_hour: self.schedule.daily_hour,
            security_interval: Duration::from_secs(self.schedule.security_interval_hours * 3600),
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
        }
    }
}
