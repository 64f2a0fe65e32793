//! recur: run the reopen and due-notification jobs against a JSON task fixture.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use recur_core::RecurConfig;
use recur_core::app::{DueNotifier, ReopenOrchestrator, Scheduler};
use recur_core::domain::{RawRepeatConfig, TaskRecord};
use recur_core::impls::{InMemoryReopenLedger, InMemoryTaskStore, TracingNotifier};
use recur_core::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use recur_core::schedule::upcoming_firings;
use tracing_subscriber::EnvFilter;

/// Recurring task reopener and due-task notifier.
#[derive(Parser)]
#[command(name = "recur", version, about)]
struct Cli {
    /// JSON array of tasks used to seed the in-memory store.
    #[arg(short, long)]
    tasks: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reopen the tasks whose recurrence fires on one day and print the report.
    Reopen {
        /// Day to evaluate (YYYY-MM-DD). Defaults to today in the configured offset.
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Send notifications for tasks due within the configured horizons.
    Notify {
        /// Reference instant (RFC 3339). Defaults to now.
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Print the next firing days of a repeat config.
    Preview {
        /// Repeat config as JSON, e.g. '{"everyNumber":1,"everyUnit":"month","startDate":"2024-01-31"}'.
        #[arg(long)]
        rule: String,

        /// First day to consider (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Run both jobs periodically until Ctrl-C.
    Run,
}

/// Preview scans at most ten years ahead.
const PREVIEW_SEARCH_DAYS: u32 = 3660;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recur_core=info,recur_cli=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RecurConfig::from_env().context("failed to load configuration")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
    let store = Arc::new(match &cli.tasks {
        Some(path) => InMemoryTaskStore::with_tasks(load_tasks(path)?),
        None => InMemoryTaskStore::new(),
    });

    match cli.command {
        Command::Reopen { today } => {
            let today = today.unwrap_or_else(|| clock.today_in(config.utc_offset));
            let orchestrator = ReopenOrchestrator::new(
                store.clone(),
                Arc::new(InMemoryReopenLedger::new()),
                ids,
                config.utc_offset,
            );
            let report = orchestrator.reopen_due_tasks(today).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            print_tasks(&store).await?;
        }
        Command::Notify { now } => {
            let now = now.unwrap_or_else(|| clock.now());
            let notifier = DueNotifier::new(store, Arc::new(TracingNotifier), ids, &config);
            let report = notifier.notify_due(now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Preview { rule, from, count } => {
            let raw: RawRepeatConfig =
                serde_json::from_str(&rule).context("repeat config is not valid JSON")?;
            let rule = raw.to_rule(config.utc_offset)?;
            let from = from.unwrap_or_else(|| clock.today_in(config.utc_offset));
            for day in upcoming_firings(&rule, from, count, PREVIEW_SEARCH_DAYS) {
                println!("{} {}", day, day.format("%a"));
            }
        }
        Command::Run => run_scheduler(store, ids, clock, &config).await?,
    }

    Ok(())
}

fn load_tasks(path: &Path) -> anyhow::Result<Vec<TaskRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

async fn print_tasks(store: &InMemoryTaskStore) -> anyhow::Result<()> {
    for task in store.all().await {
        println!("{}", serde_json::to_string(&task)?);
    }
    Ok(())
}

async fn run_scheduler(
    store: Arc<InMemoryTaskStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: &RecurConfig,
) -> anyhow::Result<()> {
    let reopen = Arc::new(ReopenOrchestrator::new(
        store.clone(),
        Arc::new(InMemoryReopenLedger::new()),
        Arc::clone(&ids),
        config.utc_offset,
    ));
    let notifier = Arc::new(DueNotifier::new(store, Arc::new(TracingNotifier), ids, config));

    tracing::info!(
        reopen_every = ?config.reopen_interval,
        notify_every = ?config.notify_interval,
        offset = %config.utc_offset,
        "scheduler started"
    );
    let scheduler = Scheduler::spawn_recurrence_jobs(reopen, notifier, clock, config);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");
    scheduler.shutdown_and_join().await;
    Ok(())
}
