// src/ingest/scheduler.rs
//! Background refresh: a full refresh of every topic once a day at a fixed
//! local hour, plus a security-only refresh every few hours.
//!
//! Sinks and fetchers are injected; `start`/`stop` are idempotent and tracked
//! on the instance.

use chrono::{DateTime, Local, TimeZone};
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ingest::fetcher::FeedFetcher;
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::Topic;
use crate::store::{BulkOutcome, UpdateSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerCfg {
    /// Local hour (0..=23) of the daily full refresh.
    pub daily_hour: u32,
    pub security_interval: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            daily_hour: 6,
            security_interval: Duration::from_secs(4 * 3600),
        }
    }
}

/// One topic: where to fetch from and where to save.
#[derive(Clone)]
pub struct RefreshJob {
    pub fetcher: Arc<FeedFetcher>,
    pub sink: Arc<dyn UpdateSink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub topic: Topic,
    pub security_only: bool,
    pub fetched: usize,
    /// `None` when the save failed.
    pub outcome: Option<BulkOutcome>,
}

impl RefreshJob {
    pub fn new(fetcher: Arc<FeedFetcher>, sink: Arc<dyn UpdateSink>) -> Self {
        Self { fetcher, sink }
    }

    /// Fetch then bulk-save. An empty fetch leaves the store untouched.
    pub async fn run(&self, security_only: bool) -> RefreshReport {
        ensure_metrics_described();
        let topic = self.fetcher.topic();
        let updates = if security_only {
            self.fetcher.fetch_security_feeds().await
        } else {
            self.fetcher.fetch_all_feeds().await
        };
        let fetched = updates.len();
        let outcome = if updates.is_empty() {
            Some(BulkOutcome::default())
        } else {
            self.sink.save_bulk(updates).await
        };

        counter!("refresh_runs_total", "topic" => topic.as_str()).increment(1);
        match outcome {
            Some(o) => info!(
                target: "scheduler",
                topic = topic.as_str(),
                security_only,
                fetched,
                added = o.added,
                updated = o.updated,
                sink = %self.sink.name(),
                "refresh done"
            ),
            None => warn!(
                target: "scheduler",
                topic = topic.as_str(),
                security_only,
                fetched,
                sink = %self.sink.name(),
                "refresh fetched but save failed"
            ),
        }
        RefreshReport {
            topic,
            security_only,
            fetched,
            outcome,
        }
    }
}

/// Time until the next `hour:00` strictly after `now`, in `now`'s zone.
pub fn until_next_hour<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Duration {
    let hour = hour.min(23);
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        let target = day
            .and_hms_opt(hour, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());
        if let Some(t) = target {
            if t > *now {
                return (t - now.clone()).to_std().unwrap_or(Duration::from_secs(3600));
            }
        }
        match day.succ_opt() {
            Some(d) => day = d,
            None => break,
        }
    }
    Duration::from_secs(24 * 3600)
}

pub struct Scheduler {
    jobs: Arc<Vec<RefreshJob>>,
    cfg: SchedulerCfg,
    handles: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl Scheduler {
    pub fn new(jobs: Vec<RefreshJob>, cfg: SchedulerCfg) -> Self {
        Self {
            jobs: Arc::new(jobs),
            cfg,
            handles: Mutex::new(None),
        }
    }

    pub fn jobs(&self) -> &[RefreshJob] {
        &self.jobs
    }

    pub fn config(&self) -> SchedulerCfg {
        self.cfg
    }

    /// Every topic, full refresh, in job order.
    pub async fn refresh_all(&self) -> Vec<RefreshReport> {
        run_jobs(&self.jobs, false).await
    }

    /// Security feeds only; topics without a security category are skipped.
    pub async fn refresh_security(&self) -> Vec<RefreshReport> {
        run_jobs(&self.jobs, true).await
    }

    pub fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<JoinHandle<()>>>> {
        self.handles.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Spawn the two loops. Returns `false` (and does nothing) when already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            warn!(target: "scheduler", "scheduler already running");
            return false;
        }

        let daily_jobs = Arc::clone(&self.jobs);
        let hour = self.cfg.daily_hour.min(23);
        let daily = tokio::spawn(async move {
            loop {
                let wait = until_next_hour(&Local::now(), hour);
                info!(target: "scheduler", hour, wait_secs = wait.as_secs(), "next full refresh scheduled");
                tokio::time::sleep(wait).await;
                run_jobs(&daily_jobs, false).await;
                gauge!("refresh_last_full_ts").set(chrono::Utc::now().timestamp() as f64);
            }
        });

        let sec_jobs = Arc::clone(&self.jobs);
        let every = self.cfg.security_interval.max(Duration::from_secs(60));
        let security = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                run_jobs(&sec_jobs, true).await;
                gauge!("refresh_last_security_ts").set(chrono::Utc::now().timestamp() as f64);
            }
        });

        *slot = Some(vec![daily, security]);
        info!(
            target: "scheduler",
            jobs = self.jobs.len(),
            daily_hour = hour,
            security_every_secs = every.as_secs(),
            "scheduler started"
        );
        true
    }

    /// Abort both loops. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        let Some(handles) = self.slot().take() else {
            return false;
        };
        for h in handles {
            h.abort();
        }
        info!(target: "scheduler", "scheduler stopped");
        true
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handles) = self.slot().take() {
            for h in handles {
                h.abort();
            }
        }
    }
}

async fn run_jobs(jobs: &[RefreshJob], security_only: bool) -> Vec<RefreshReport> {
    let mut reports = Vec::with_capacity(jobs.len());
    for job in jobs {
        if security_only && job.fetcher.profile().security_category().is_none() {
            continue;
        }
        reports.push(job.run(security_only).await);
    }
    reports
}
