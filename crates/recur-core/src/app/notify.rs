//! DueNotifier - 期限が近いタスクの通知
//!
//! # フロー
//! 1. `fetch_due_tasks` で各 horizon に入るタスクを取得
//! 2. タスクごとに `Notification` を組み立てて Notifier に渡す
//!
//! 配送の失敗はタスク単位で数えるだけで、バッチは止めません。
//! 送信者ラベルは設定の候補から実行ごとに 1 つ選び、その実行の通知すべてで使います。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::field;

use super::due::fetch_due_tasks;
use crate::config::RecurConfig;
use crate::domain::{DueHorizon, DueTask, RunId};
use crate::error::Result;
use crate::ports::{IdGenerator, Notification, Notifier, TaskStore};

/// Outcome of one notify run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub run_id: RunId,
    pub now: DateTime<Utc>,
    pub sender_label: String,
    pub selected: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
}

/// Reminder text for `task` in `horizon`.
pub fn reminder_text(task: &DueTask, horizon: DueHorizon) -> String {
    format!("Reminder: Task \"{}\" {}!", task.title, horizon.framing())
}

pub struct DueNotifier {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
    horizons: Vec<DueHorizon>,
    page_size: usize,
    sender_labels: Vec<String>,
    destination: String,
}

impl DueNotifier {
    pub fn new(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
        config: &RecurConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            ids,
            horizons: config.notify_horizons.clone(),
            page_size: config.page_size,
            sender_labels: config.sender_labels.clone(),
            destination: config.destination.clone(),
        }
    }

    fn pick_sender(&self) -> String {
        self.sender_labels
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }

    fn build(&self, task: &DueTask, horizon: DueHorizon, sender_label: &str) -> Notification {
        Notification {
            task_title: task.title.clone(),
            message_text: reminder_text(task, horizon),
            sender_label: sender_label.to_string(),
            destination: self.destination.clone(),
        }
    }

    /// Sends one notification per task due within a configured horizon of `now`.
    ///
    /// # Errors
    ///
    /// Returns `RecurError::Store` if the due-task read fails. Delivery failures
    /// are counted in the report.
    #[tracing::instrument(name = "notify_run", skip(self), fields(run_id = field::Empty))]
    pub async fn notify_due(&self, now: DateTime<Utc>) -> Result<NotifyReport> {
        let run_id = self.ids.generate_run_id();
        tracing::Span::current().record("run_id", field::display(run_id));

        let selected =
            fetch_due_tasks(self.store.as_ref(), now, &self.horizons, self.page_size).await?;

        let mut report = NotifyReport {
            run_id,
            now,
            sender_label: self.pick_sender(),
            selected: selected.values().map(Vec::len).sum(),
            delivered: 0,
            delivery_failures: 0,
        };

        for (horizon, tasks) in &selected {
            for task in tasks {
                let notification = self.build(task, *horizon, &report.sender_label);
                match self.notifier.notify(&notification).await {
                    Ok(()) => report.delivered += 1,
                    Err(err) => {
                        tracing::warn!(task_id = %task.id, %horizon, error = %err, "notification delivery failed");
                        report.delivery_failures += 1;
                    }
                }
            }
        }

        if report.selected > 0 {
            tracing::info!(
                selected = report.selected,
                delivered = report.delivered,
                failures = report.delivery_failures,
                "notify run finished"
            );
        } else {
            tracing::debug!("no tasks due");
        }
        Ok(report)
    }
}
