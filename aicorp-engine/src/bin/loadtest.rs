//! Load test for the organization engine.
//!
//! Boots the default organization with the offline echo capability, then
//! fires N work items per skill at once from concurrent tasks. Every
//! assigned item must come back as exactly one deliverable. Reports
//! assignment outcomes, scale-ups, completion rate and elapsed time.
//!
//! Usage:
//!   cargo run --release --bin loadtest -- --items 40 --latency-ms 50

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::sync::Barrier;

use aicorp_engine::events::NullSink;
use aicorp_engine::llm::EchoCompletion;
use aicorp_engine::model::{Skill, WorkItem};
use aicorp_engine::org::Organization;
use aicorp_engine::Settings;

#[derive(Parser, Debug)]
#[command(name = "loadtest", about = "Organization engine load test")]
struct Args {
    #[command(flatten)]
    settings: Settings,

    /// Work items submitted per skill
    #[arg(long, default_value = "20")]
    items: usize,

    /// Simulated completion latency upper bound (ms)
    #[arg(long, default_value = "50")]
    latency_ms: u64,

    /// Timeout waiting for reviews to drain (seconds)
    #[arg(long, default_value = "120")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aicorp_engine=warn".into()),
        )
        .init();

    let args = Args::parse();
    let latency = Duration::from_millis(args.latency_ms);
    let completion = Arc::new(EchoCompletion::new().with_latency(latency / 4, latency));
    let (org, _completions) =
        Organization::new(args.settings.clone(), completion.clone(), Arc::new(NullSink), None)?;
    org.initialize_structure()?;

    let skills: Vec<Skill> = Skill::ALL
        .into_iter()
        .filter(|s| !org.managers_with_specialty(*s).is_empty())
        .collect();
    let total = skills.len() * args.items;

    println!("🔥 aicorp load test");
    println!("   Skills:     {}", skills.len());
    println!("   Items/skill:{:>4}", args.items);
    println!("   Total:      {total}");
    println!("   Permits:    {}", args.settings.completion_permits);
    println!("   Max pool:   {}", args.settings.max_pool_size);
    println!();

    let barrier = Arc::new(Barrier::new(total));
    let start = Instant::now();
    let mut tasks = Vec::with_capacity(total);
    for skill in &skills {
        for i in 0..args.items {
            let org = Arc::clone(&org);
            let barrier = Arc::clone(&barrier);
            let skill = *skill;
            tasks.push(tokio::spawn(async move {
                let work = WorkItem::new(format!("Load {skill} #{i}"), "Synthetic load item");
                let work_id = work.id;
                barrier.wait().await;
                org.assign_work(skill, work).ok().map(|employee| (work_id, employee))
            }));
        }
    }

    let results = futures::future::join_all(tasks).await;
    let assigned: Vec<_> = results.into_iter().filter_map(|r| r.ok().flatten()).collect();
    let failed = total - assigned.len();
    let distinct: HashSet<_> = assigned.iter().map(|(work, _)| *work).collect();
    println!("📡 Submitted in {:.2}s", start.elapsed().as_secs_f64());
    println!("   Assigned:   {}", assigned.len());
    println!("   Failed:     {failed}");

    println!("⏳ Waiting for reviews to drain...");
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    let delivered = loop {
        let done: HashSet<_> = org
            .deliverables()
            .iter()
            .map(|d| d.work_item_id)
            .filter(|id| distinct.contains(id))
            .collect();
        if done.len() >= distinct.len() || Instant::now() >= deadline {
            break done.len();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };

    let elapsed = start.elapsed();
    let stats = org.stats();
    org.stop().await;

    let rate = if distinct.is_empty() {
        100.0
    } else {
        delivered as f64 / distinct.len() as f64 * 100.0
    };
    println!();
    println!("📊 Results (elapsed: {:.1}s)", elapsed.as_secs_f64());
    println!("   Employees:     {}", stats.total_employees);
    println!("   Scale-ups:     {}", stats.scale_ups);
    println!("   Assign fails:  {}", stats.assignment_failures);
    println!("   Deliverables:  {}", stats.deliverables);
    println!("   Completions:   {}", completion.calls());
    println!("   Completion:    {rate:.1}%");
    println!("   Throughput:    {:.0} items/sec", delivered as f64 / elapsed.as_secs_f64());
    println!();

    if distinct.len() != assigned.len() {
        println!("❌ FAIL — an item was assigned more than once");
        std::process::exit(1);
    }
    if rate >= 99.9 {
        println!("✅ PASS — {rate:.1}% of assigned items delivered");
    } else {
        println!("❌ FAIL — {rate:.1}% of assigned items delivered");
        std::process::exit(1);
    }
    Ok(())
}
