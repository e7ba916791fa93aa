//! veille-rss binary.
//!
//! ```text
//! veille-rss refresh [windows|cloud|starlink|all]   one fetch-and-save pass
//! veille-rss serve                                  scheduler until Ctrl-C
//! veille-rss stats                                  per-topic store summary
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use veille_rss::config::PipelineConfig;
use veille_rss::ingest::scheduler::Scheduler;
use veille_rss::ingest::types::Topic;
use veille_rss::store::{FlatFileStore, StarlinkStore};
use veille_rss::{build_jobs, build_scheduler};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veille_rss=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// One fetch-and-save pass
    Refresh {
        #[arg(value_enum, default_value_t = TopicArg::All)]
        topic: TopicArg,
    },
    /// Run the scheduler until Ctrl-C
    Serve,
    /// Per-topic store summary as JSON
    Stats,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TopicArg {
    Windows,
    Cloud,
    Starlink,
    All,
}

impl TopicArg {
    fn topics(self) -> Vec<Topic> {
        match self {
            TopicArg::Windows => vec![Topic::Windows],
            TopicArg::Cloud => vec![Topic::Cloud],
            TopicArg::Starlink => vec![Topic::Starlink],
            TopicArg::All => Topic::all().to_vec(),
        }
    }
}

async fn refresh(cfg: &PipelineConfig, topics: &[Topic]) -> Result<()> {
    let scheduler = Scheduler::new(build_jobs(cfg, topics)?, cfg.scheduler());
    if scheduler.jobs().is_empty() {
        warn!("no enabled topic to refresh");
        return Ok(());
    }
    let reports = scheduler.refresh_all().await;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    if reports.iter().any(|r| r.outcome.is_none()) {
        bail!("at least one topic failed to save");
    }
    Ok(())
}

async fn serve(cfg: &PipelineConfig) -> Result<()> {
    let scheduler = build_scheduler(cfg)?;
    scheduler.start();
    info!(data_dir = %cfg.data_dir.display(), "serving; Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    scheduler.stop();
    Ok(())
}

async fn stats(cfg: &PipelineConfig) -> Result<()> {
    let mut out = serde_json::Map::new();
    for topic in [Topic::Windows, Topic::Cloud] {
        let store = FlatFileStore::new(cfg.store_options(topic));
        let s = store
            .stats()
            .await
            .with_context(|| format!("reading {} store", topic.as_str()))?;
        out.insert(topic.as_str().to_string(), serde_json::to_value(s)?);
    }
    let starlink = StarlinkStore::new(&cfg.data_dir);
    let mut s = serde_json::to_value(starlink.stats().await)?;
    s["categories"] = serde_json::to_value(starlink.categories().await)?;
    out.insert(Topic::Starlink.as_str().to_string(), s);
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = PipelineConfig::load_default()?;
    match cli.cmd {
        Command::Refresh { topic } => refresh(&cfg, &topic.topics()).await,
        Command::Serve => serve(&cfg).await,
        Command::Stats => stats(&cfg).await,
    }
}
