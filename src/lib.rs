// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod store;

use std::sync::Arc;

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::ingest::fetcher::FeedFetcher;
use crate::ingest::providers::profile_for;
use crate::ingest::scheduler::{RefreshJob, Scheduler};
use crate::ingest::transport::{FeedTransport, HttpTransport};
use crate::ingest::types::Topic;
use crate::store::{FlatFileStore, StarlinkStore, UpdateSink};

pub use crate::ingest::types::Update;

/// Fetcher for `topic` with the configured sources and pause.
pub fn build_fetcher(
    cfg: &PipelineConfig,
    topic: Topic,
    transport: Arc<dyn FeedTransport>,
) -> FeedFetcher {
    let mut fetcher = FeedFetcher::new(profile_for(topic), transport).with_delay(cfg.delay_for(topic));
    let overrides = &cfg.topic(topic).sources;
    if !overrides.is_empty() {
        fetcher = fetcher.with_sources(overrides.clone());
    }
    fetcher
}

/// Store for `topic` under the configured data dir.
pub fn build_sink(cfg: &PipelineConfig, topic: Topic) -> Arc<dyn UpdateSink> {
    match topic {
        Topic::Starlink => Arc::new(
            StarlinkStore::new(&cfg.data_dir).with_max_records(cfg.store.max_records),
        ),
        Topic::Windows | Topic::Cloud => Arc::new(FlatFileStore::new(cfg.store_options(topic))),
    }
}

/// One refresh job per enabled topic among `topics`, each with its own HTTP
/// transport (the revalidation window is per topic).
pub fn build_jobs(cfg: &PipelineConfig, topics: &[Topic]) -> Result<Vec<RefreshJob>> {
    let mut jobs = Vec::new();
    for &topic in topics {
        if !cfg.topic(topic).enabled {
            continue;
        }
        let transport: Arc<dyn FeedTransport> = Arc::new(HttpTransport::new(
            &cfg.http.user_agent,
            cfg.http_timeout(),
            cfg.cache_window_for(topic),
        )?);
        let fetcher = Arc::new(build_fetcher(cfg, topic, transport));
        jobs.push(RefreshJob::new(fetcher, build_sink(cfg, topic)));
    }
    Ok(jobs)
}

/// Scheduler over every enabled topic.
pub fn build_scheduler(cfg: &PipelineConfig) -> Result<Scheduler> {
    Ok(Scheduler::new(build_jobs(cfg, &Topic::all())?, cfg.scheduler()))
}
