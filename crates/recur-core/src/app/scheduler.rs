//! Scheduler - reopen / notify の定期実行
//!
//! # 設計原則
//! - ジョブごとに 1 本の interval ループ（`MissedTickBehavior::Skip`）
//! - ジョブごとの run ロック: 前回の実行が終わっていない tick は warn を出して飛ばす
//! - shutdown は watch channel。実行中のジョブは中断せず、終了を待つ

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::notify::DueNotifier;
use super::reopen::ReopenOrchestrator;
use crate::config::RecurConfig;
use crate::ports::Clock;

/// Scheduler handle.
/// - `request_shutdown()` で新しい tick を止める
/// - `shutdown_and_join()` で実行中のジョブも含めて終了を待つ
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            joins: Vec::new(),
        }
    }

    /// Runs `job` every `period`, starting immediately. Overlapping ticks are skipped.
    pub fn every<F, Fut>(&mut self, name: &'static str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.joins
            .push(tokio::spawn(periodic_loop(name, period, shutdown_rx, job)));
    }

    /// Spawns the reopen and notify loops.
    ///
    /// "today" for the reopen job is the clock's calendar day in `config.utc_offset`.
    pub fn spawn_recurrence_jobs(
        reopen: Arc<ReopenOrchestrator>,
        notifier: Arc<DueNotifier>,
        clock: Arc<dyn Clock>,
        config: &RecurConfig,
    ) -> Self {
        let mut scheduler = Self::new();
        let offset = config.utc_offset;

        let reopen_clock = Arc::clone(&clock);
        scheduler.every("reopen", config.reopen_interval, move || {
            let reopen = Arc::clone(&reopen);
            let today = reopen_clock.today_in(offset);
            async move {
                if let Err(err) = reopen.reopen_due_tasks(today).await {
                    tracing::error!(%today, error = %err, "reopen run failed");
                }
            }
        });

        scheduler.every("notify", config.notify_interval, move || {
            let notifier = Arc::clone(&notifier);
            let now = clock.now();
            async move {
                if let Err(err) = notifier.notify_due(now).await {
                    tracing::error!(%now, error = %err, "notify run failed");
                }
            }
        });

        scheduler
    }

    pub fn request_shutdown(&self) {
        // receiver がすでに drop されていても構わない
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for every loop, including in-flight runs.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn periodic_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    job: F,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let run_lock = Arc::new(Mutex::new(()));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender が drop されたら止まる
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let Ok(guard) = Arc::clone(&run_lock).try_lock_owned() else {
            tracing::warn!(job = name, "previous run still in progress, skipping tick");
            continue;
        };
        let run = job();
        tokio::spawn(async move {
            run.await;
            drop(guard);
        });
    }

    // 実行中の run が終わるまで待つ
    let _idle = run_lock.lock().await;
    tracing::debug!(job = name, "scheduler loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_once_per_tick_starting_immediately() {
        let runs = counter();
        let mut scheduler = Scheduler::new();
        let job_runs = Arc::clone(&runs);
        scheduler.every("count", Duration::from_secs(60), move || {
            let runs = Arc::clone(&job_runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        scheduler.shutdown_and_join().await;

        // ticks at 0s, 60s, 120s
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_tick_is_skipped_and_shutdown_waits_for_in_flight_run() {
        let started = counter();
        let finished = counter();
        let mut scheduler = Scheduler::new();
        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
        scheduler.every("slow", Duration::from_secs(60), move || {
            let (started, finished) = (Arc::clone(&s), Arc::clone(&f));
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(90)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });

        // runs start at 0s and 120s; the 60s and 180s ticks find the lock held
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        scheduler.shutdown_and_join().await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_shutdown() {
        let runs = counter();
        let mut scheduler = Scheduler::new();
        let job_runs = Arc::clone(&runs);
        scheduler.every("count", Duration::from_secs(60), move || {
            let runs = Arc::clone(&job_runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.shutdown_and_join().await;
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
