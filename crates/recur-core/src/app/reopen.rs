//! ReopenOrchestrator - 繰り返しタスクの reopen
//!
//! # フロー
//! 1. TaskStore から候補（repeat config あり・completed 以外）を取得
//! 2. payload を検証し、`should_fire_on(rule, today)` で判定
//! 3. ReopenLedger の watermark で同日 2 回目を除外
//! 4. 発火したタスクをまとめて `open` に戻す（バルク書き込み 1 回）
//! 5. `After(n)` のタスクだけ、減算したルールをタスク単位で書き戻す
//! 6. watermark を記録
//!
//! # 失敗時の扱い
//! - 候補の読み取り失敗: 何も書かずに `Err`
//! - 不正な payload: warn を出してそのタスクだけ発火しない
//! - バルク書き込み失敗: 減算も watermark も書かない（次回の実行で再挑戦）
//! - 減算の書き込み失敗: status は戻さない。他のタスクには影響しない

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::field;

use crate::domain::{EndPolicy, RawRepeatConfig, RecurrenceRule, RunId, TaskId, TaskStatus};
use crate::error::Result;
use crate::ports::{IdGenerator, ReopenLedger, TaskStore};
use crate::schedule::{apply_firing, should_fire_on};

/// Outcome of one reopen run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReopenReport {
    pub run_id: RunId,
    pub day: NaiveDate,
    /// Tasks returned by the store.
    pub candidates: usize,
    /// Candidates whose repeat config failed validation.
    pub malformed: usize,
    /// Firing tasks skipped because they were already reopened on `day`.
    pub already_reopened: usize,
    /// Watermark reads or writes that failed.
    pub ledger_failures: usize,
    /// Tasks moved back to open.
    pub reopened: Vec<TaskId>,
    /// `After(n)` rules written back with one occurrence consumed.
    pub decremented: usize,
    pub decrement_failures: usize,
    pub bulk_update_failed: bool,
}

impl ReopenReport {
    fn new(run_id: RunId, day: NaiveDate, candidates: usize) -> Self {
        Self {
            run_id,
            day,
            candidates,
            malformed: 0,
            already_reopened: 0,
            ledger_failures: 0,
            reopened: Vec::new(),
            decremented: 0,
            decrement_failures: 0,
            bulk_update_failed: false,
        }
    }
}

/// Task whose rule fires today and has not been reopened yet.
struct Firing {
    id: TaskId,
    raw: RawRepeatConfig,
    rule: RecurrenceRule,
}

/// ReopenOrchestrator は reopen 1 回分の副作用をまとめて適用
///
/// # テスト容易性
/// - "today" は引数で受け取る（時計は Scheduler 側）
/// - ストア・ledger・ID 生成はすべて port 経由
pub struct ReopenOrchestrator {
    store: Arc<dyn TaskStore>,
    ledger: Arc<dyn ReopenLedger>,
    ids: Arc<dyn IdGenerator>,
    offset: FixedOffset,
}

impl ReopenOrchestrator {
    /// `offset` is the reference timezone used to read timestamp-valued dates in repeat configs.
    pub fn new(
        store: Arc<dyn TaskStore>,
        ledger: Arc<dyn ReopenLedger>,
        ids: Arc<dyn IdGenerator>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            ledger,
            ids,
            offset,
        }
    }

    /// Reopens every task whose recurrence fires on `today`.
    ///
    /// # Errors
    ///
    /// Returns `RecurError::Store` only when the candidate read fails. Write
    /// failures are logged and reported in the returned `ReopenReport`.
    #[tracing::instrument(name = "reopen_run", skip(self), fields(run_id = field::Empty))]
    pub async fn reopen_due_tasks(&self, today: NaiveDate) -> Result<ReopenReport> {
        let run_id = self.ids.generate_run_id();
        tracing::Span::current().record("run_id", field::display(run_id));

        let candidates = self.store.query_recurring_open_tasks().await?;
        let mut report = ReopenReport::new(run_id, today, candidates.len());

        let mut firing = Vec::new();
        for task in candidates {
            if !task.status.is_reopen_candidate() {
                continue;
            }

            let rule = match task.rule.to_rule(self.offset) {
                Ok(rule) => rule,
                Err(err) => {
                    tracing::warn!(task_id = %task.id, error = %err, "skipping malformed repeat config");
                    report.malformed += 1;
                    continue;
                }
            };
            if !should_fire_on(&rule, today) {
                continue;
            }

            match self.ledger.last_reopened(task.id).await {
                Ok(Some(last)) if last == today => {
                    tracing::debug!(task_id = %task.id, "already reopened today");
                    report.already_reopened += 1;
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    // watermark が読めないタスクは二重発火を避けて次回に回す
                    tracing::warn!(task_id = %task.id, error = %err, "reopen watermark unavailable, skipping");
                    report.ledger_failures += 1;
                    continue;
                }
            }

            firing.push(Firing {
                id: task.id,
                raw: task.rule,
                rule,
            });
        }

        if firing.is_empty() {
            tracing::info!(candidates = report.candidates, "no recurring tasks fire today");
            return Ok(report);
        }

        let ids: Vec<TaskId> = firing.iter().map(|f| f.id).collect();
        if let Err(err) = self.store.update_status(&ids, TaskStatus::Open).await {
            tracing::error!(count = ids.len(), error = %err, "bulk reopen failed, tasks stay eligible");
            report.bulk_update_failed = true;
            return Ok(report);
        }

        for f in &firing {
            let EndPolicy::After(_) = f.rule.end else {
                continue;
            };
            let remaining = apply_firing(&f.rule).end.occurrences_remaining().unwrap_or(0);
            match self
                .store
                .update_recurrence_rule(f.id, f.raw.with_occurrences(remaining))
                .await
            {
                Ok(()) => report.decremented += 1,
                Err(err) => {
                    // status は open のまま。occurrences は減らない
                    tracing::error!(task_id = %f.id, error = %err, "failed to persist decremented occurrences");
                    report.decrement_failures += 1;
                }
            }
        }

        if let Err(err) = self.ledger.record_reopened(&ids, today).await {
            tracing::warn!(count = ids.len(), error = %err, "failed to record reopen watermarks");
            report.ledger_failures += 1;
        }

        report.reopened = ids;
        tracing::info!(
            candidates = report.candidates,
            reopened = report.reopened.len(),
            malformed = report.malformed,
            decrement_failures = report.decrement_failures,
            "reopen run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskRecord;
    use crate::error::RecurError;
    use crate::impls::{InMemoryReopenLedger, InMemoryTaskStore};
    use crate::ports::{StoreError, SystemClock, UlidGenerator};
    use serde_json::json;
    use ulid::Ulid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task_id(n: u128) -> TaskId {
        TaskId::from(Ulid(n))
    }

    fn raw(value: serde_json::Value) -> RawRepeatConfig {
        serde_json::from_value(value).unwrap()
    }

    fn daily() -> RawRepeatConfig {
        raw(json!({ "everyNumber": 1, "everyUnit": "day", "startDate": "2024-01-20", "ends": "never" }))
    }

    fn after(n: i64) -> RawRepeatConfig {
        raw(json!({
            "everyNumber": 1,
            "everyUnit": "day",
            "startDate": "2024-01-20",
            "ends": "after",
            "occurrences": n
        }))
    }

    fn recurring(n: u128, status: TaskStatus, rule: RawRepeatConfig) -> TaskRecord {
        TaskRecord::new(task_id(n), format!("task {n}"), status).with_repeat_config(rule)
    }

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        ledger: Arc<InMemoryReopenLedger>,
        orchestrator: ReopenOrchestrator,
    }

    fn fixture(tasks: Vec<TaskRecord>) -> Fixture {
        let store = Arc::new(InMemoryTaskStore::with_tasks(tasks));
        let ledger = Arc::new(InMemoryReopenLedger::new());
        let orchestrator = ReopenOrchestrator::new(
            store.clone(),
            ledger.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            FixedOffset::east_opt(0).unwrap(),
        );
        Fixture {
            store,
            ledger,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn reopens_firing_tasks_in_one_bulk_write() {
        let f = fixture(vec![
            recurring(1, TaskStatus::Cancelled, daily()),
            recurring(2, TaskStatus::InProgress, daily()),
            recurring(3, TaskStatus::Cancelled, raw(json!({
                "everyNumber": 1, "everyUnit": "day", "startDate": "2024-02-01"
            }))),
        ]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.reopened, vec![task_id(1), task_id(2)]);
        assert_eq!(f.store.status_writes().await, 1);
        assert_eq!(f.store.get(task_id(1)).await.unwrap().status, TaskStatus::Open);
        assert_eq!(f.store.get(task_id(3)).await.unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn nothing_fires_means_no_writes() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, daily())]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 19)).await.unwrap();

        assert!(report.reopened.is_empty());
        assert_eq!(f.store.status_writes().await, 0);
    }

    #[tokio::test]
    async fn completed_tasks_are_never_reopened() {
        let f = fixture(vec![recurring(1, TaskStatus::Completed, daily())]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert!(report.reopened.is_empty());
        assert_eq!(f.store.get(task_id(1)).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn after_rule_is_decremented_and_other_fields_kept() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, after(3))]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.decremented, 1);
        let stored = f.store.get(task_id(1)).await.unwrap().repeat_config.unwrap();
        assert_eq!(stored, after(2));
    }

    #[tokio::test]
    async fn never_and_on_rules_are_not_rewritten() {
        let on = raw(json!({
            "everyNumber": 1, "everyUnit": "day", "startDate": "2024-01-20",
            "ends": "on", "endDate": "2024-02-01", "occurrences": 10
        }));
        let f = fixture(vec![
            recurring(1, TaskStatus::Cancelled, daily()),
            recurring(2, TaskStatus::Cancelled, on.clone()),
        ]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.reopened.len(), 2);
        assert_eq!(report.decremented, 0);
        assert_eq!(f.store.get(task_id(2)).await.unwrap().repeat_config, Some(on));
    }

    #[tokio::test]
    async fn exhausted_rule_does_not_fire() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, after(0))]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert!(report.reopened.is_empty());
        assert_eq!(f.store.get(task_id(1)).await.unwrap().repeat_config, Some(after(0)));
    }

    #[tokio::test]
    async fn malformed_rule_is_counted_and_does_not_block_others() {
        let broken = raw(json!({ "everyNumber": 0, "everyUnit": "day", "startDate": "2024-01-20" }));
        let f = fixture(vec![
            recurring(1, TaskStatus::Cancelled, broken),
            recurring(2, TaskStatus::Cancelled, daily()),
        ]);

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.malformed, 1);
        assert_eq!(report.reopened, vec![task_id(2)]);
    }

    #[tokio::test]
    async fn read_failure_aborts_without_writes() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, daily())]);
        f.store
            .fail_recurring_query(StoreError::Unavailable("timeout".to_string()))
            .await;

        let err = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap_err();

        let RecurError::Store(store_err) = err;
        assert_eq!(store_err, StoreError::Unavailable("timeout".to_string()));
        assert_eq!(f.store.get(task_id(1)).await.unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn bulk_failure_skips_decrements_and_watermarks() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, after(2))]);
        f.store
            .fail_status_update(StoreError::Rejected("locked".to_string()))
            .await;

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert!(report.bulk_update_failed);
        assert!(report.reopened.is_empty());
        assert_eq!(f.store.get(task_id(1)).await.unwrap().repeat_config, Some(after(2)));
        assert_eq!(f.ledger.last_reopened(task_id(1)).await.unwrap(), None);

        // 次の実行で再挑戦される
        f.store.clear_faults().await;
        let retry = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();
        assert_eq!(retry.reopened, vec![task_id(1)]);
    }

    #[tokio::test]
    async fn decrement_failure_is_isolated_per_task() {
        let f = fixture(vec![
            recurring(1, TaskStatus::Cancelled, after(5)),
            recurring(2, TaskStatus::Cancelled, after(5)),
        ]);
        f.store
            .fail_rule_update(task_id(1), StoreError::Rejected("conflict".to_string()))
            .await;

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.reopened.len(), 2);
        assert_eq!(report.decrement_failures, 1);
        assert_eq!(report.decremented, 1);
        assert_eq!(f.store.get(task_id(1)).await.unwrap().status, TaskStatus::Open);
        assert_eq!(f.store.get(task_id(1)).await.unwrap().repeat_config, Some(after(5)));
        assert_eq!(f.store.get(task_id(2)).await.unwrap().repeat_config, Some(after(4)));
    }

    #[tokio::test]
    async fn second_run_on_same_day_is_a_no_op() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, after(5))]);
        let today = day(2024, 1, 20);

        f.orchestrator.reopen_due_tasks(today).await.unwrap();
        let second = f.orchestrator.reopen_due_tasks(today).await.unwrap();

        assert_eq!(second.already_reopened, 1);
        assert!(second.reopened.is_empty());
        assert_eq!(f.store.status_writes().await, 1);
        assert_eq!(f.store.get(task_id(1)).await.unwrap().repeat_config, Some(after(4)));

        let next_day = f.orchestrator.reopen_due_tasks(day(2024, 1, 21)).await.unwrap();
        assert_eq!(next_day.reopened, vec![task_id(1)]);
    }

    #[tokio::test]
    async fn unreadable_watermark_skips_the_task() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, daily())]);
        f.ledger
            .fail_reads_with(StoreError::Unavailable("ledger down".to_string()))
            .await;

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.ledger_failures, 1);
        assert!(report.reopened.is_empty());
        assert_eq!(f.store.status_writes().await, 0);
    }

    #[tokio::test]
    async fn failed_watermark_write_keeps_tasks_reopened() {
        let f = fixture(vec![recurring(1, TaskStatus::Cancelled, after(3))]);
        f.ledger
            .fail_writes_with(StoreError::Unavailable("ledger read-only".to_string()))
            .await;

        let report = f.orchestrator.reopen_due_tasks(day(2024, 1, 20)).await.unwrap();

        assert_eq!(report.reopened, vec![task_id(1)]);
        assert_eq!(report.ledger_failures, 1);
        assert_eq!(report.decremented, 1);
        let task = f.store.get(task_id(1)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.repeat_config, Some(after(2)));
        assert_eq!(f.ledger.last_reopened(task_id(1)).await.unwrap(), None);
    }
}
