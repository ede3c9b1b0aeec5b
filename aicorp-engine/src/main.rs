//! aicorp: run the simulated company.
//!
//! Without an API key the offline echo capability answers every call, so
//! the whole pipeline can be watched locally:
//!
//!   aicorp --seed-file company.toml --events
//!
//! Set ANTHROPIC_API_KEY to use Claude.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use aicorp_engine::board::FixedBoard;
use aicorp_engine::events::{BroadcastSink, EventSink};
use aicorp_engine::llm::{Completion, EchoCompletion, LlmClient};
use aicorp_engine::memory::{Memory, Store};
use aicorp_engine::seed::CompanySeed;
use aicorp_engine::{Company, Settings};

#[derive(Parser)]
#[command(name = "aicorp", about = "Simulated AI company")]
struct Args {
    #[command(flatten)]
    settings: Settings,

    /// Anthropic API key; the offline echo capability is used without one
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    api_key: Option<String>,

    /// Claude model to use
    #[arg(long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// SQLite database path
    #[arg(long, env = "AICORP_DB", default_value = "aicorp.db")]
    db: PathBuf,

    /// TOML company seed to activate at startup
    #[arg(long)]
    seed_file: Option<PathBuf>,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value_t = 30)]
    stats_interval_secs: u64,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    events: bool,
}

fn load_seed_file(path: &PathBuf) -> Result<CompanySeed> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid seed file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with AICORP_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("AICORP_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("aicorp_engine=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();
    args.settings.validate()?;

    let completion: Arc<dyn Completion> = match &args.api_key {
        Some(key) if !key.is_empty() => {
            tracing::info!(model = %args.model, "Using Claude");
            Arc::new(LlmClient::new(key.clone()).with_model(&args.model))
        }
        _ => {
            tracing::info!("No API key, using offline echo completions");
            Arc::new(
                EchoCompletion::new().with_latency(Duration::from_millis(200), Duration::from_millis(1200)),
            )
        }
    };

    if let Some(parent) = args.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store: Arc<dyn Store> = Arc::new(
        Memory::open(&args.db).with_context(|| format!("failed to open {}", args.db.display()))?,
    );

    let sink = Arc::new(BroadcastSink::new(1024));
    if args.events {
        let mut rx = sink.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!(error = %e, "Unprintable event"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event printer lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
    let events: Arc<dyn EventSink> = sink;

    let company = Company::start(
        args.settings.clone(),
        completion,
        Arc::new(FixedBoard::default()),
        events,
        Some(store),
    )
    .await?;

    if let Some(path) = &args.seed_file {
        let seed = load_seed_file(path)?;
        let seed = company.set_seed(seed).await;
        tracing::info!(company = %seed.company_name, mission = %seed.mission, "Seed activated");
    } else if !company.org.has_seed() {
        tracing::warn!("No company seed; pipelines start once one is set (--seed-file)");
    }

    let org = Arc::clone(&company.org);
    let pipelines = Arc::clone(&company.pipelines);
    if args.stats_interval_secs > 0 {
        let interval = Duration::from_secs(args.stats_interval_secs);
        let cancel = org.cancellation().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let stats = org.stats();
                tracing::info!(
                    status = %stats.status,
                    employees = stats.total_employees,
                    deliverables = stats.deliverables,
                    scale_ups = stats.scale_ups,
                    assignment_failures = stats.assignment_failures,
                    pipelines = ?pipelines.stage_counts(),
                    "Stats"
                );
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    company.shutdown().await;
    Ok(())
}
