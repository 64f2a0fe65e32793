//! InMemoryTaskStore - テスト・デモ用の TaskStore 実装
//!
//! # 特徴
//! - `BTreeMap<TaskId, TaskRecord>` を tokio Mutex で保護（ロックを跨いで await しない）
//! - ページングは TaskId 順の offset カーソル
//! - 障害注入（`fail_*`）で orchestrator のエラー経路をテストできる

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    DueTask, RawRepeatConfig, RecurringTask, TaskId, TaskRecord, TaskStatus, minute_floor,
};
use crate::ports::{Page, PageRequest, StoreError, TaskStore};

#[derive(Debug, Default)]
struct Faults {
    query_recurring: Option<StoreError>,
    update_status: Option<StoreError>,
    query_due: Option<StoreError>,
    rule_updates: HashMap<TaskId, StoreError>,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: BTreeMap<TaskId, TaskRecord>,
    faults: Faults,
    status_writes: usize,
}

/// In-memory task store.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskRecord>) -> Self {
        let tasks = tasks.into_iter().map(|task| (task.id, task)).collect();
        Self {
            state: Mutex::new(StoreState {
                tasks,
                ..StoreState::default()
            }),
        }
    }

    pub async fn get(&self, id: TaskId) -> Option<TaskRecord> {
        self.state.lock().await.tasks.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<TaskRecord> {
        self.state.lock().await.tasks.values().cloned().collect()
    }

    /// Number of successful `update_status` calls.
    pub async fn status_writes(&self) -> usize {
        self.state.lock().await.status_writes
    }

    // ---- 障害注入 ----

    pub async fn fail_recurring_query(&self, err: StoreError) {
        self.state.lock().await.faults.query_recurring = Some(err);
    }

    pub async fn fail_status_update(&self, err: StoreError) {
        self.state.lock().await.faults.update_status = Some(err);
    }

    pub async fn fail_due_query(&self, err: StoreError) {
        self.state.lock().await.faults.query_due = Some(err);
    }

    pub async fn fail_rule_update(&self, id: TaskId, err: StoreError) {
        self.state.lock().await.faults.rule_updates.insert(id, err);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults = Faults::default();
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn query_recurring_open_tasks(&self) -> Result<Vec<RecurringTask>, StoreError> {
        let state = self.state.lock().await;
        if let Some(err) = &state.faults.query_recurring {
            return Err(err.clone());
        }
        Ok(state
            .tasks
            .values()
            .filter(|task| task.status.is_reopen_candidate())
            .filter_map(TaskRecord::as_recurring)
            .collect())
    }

    async fn update_status(&self, ids: &[TaskId], status: TaskStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(err) = &state.faults.update_status {
            return Err(err.clone());
        }
        // 1 件でも存在しなければ何も書かない（バルク書き込みは all-or-nothing）
        if let Some(missing) = ids.iter().find(|id| !state.tasks.contains_key(*id)) {
            return Err(StoreError::NotFound(*missing));
        }
        for id in ids {
            if let Some(task) = state.tasks.get_mut(id) {
                task.status = status;
            }
        }
        state.status_writes += 1;
        Ok(())
    }

    async fn update_recurrence_rule(
        &self,
        id: TaskId,
        rule: RawRepeatConfig,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.faults.rule_updates.get(&id) {
            return Err(err.clone());
        }
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        task.repeat_config = Some(rule);
        Ok(())
    }

    async fn query_tasks_due_at(
        &self,
        timestamps: &[DateTime<Utc>],
        statuses: &[TaskStatus],
        page: PageRequest,
    ) -> Result<Page<DueTask>, StoreError> {
        let state = self.state.lock().await;
        if let Some(err) = &state.faults.query_due {
            return Err(err.clone());
        }

        let targets: Vec<DateTime<Utc>> = timestamps.iter().copied().map(minute_floor).collect();
        let matching: Vec<DueTask> = state
            .tasks
            .values()
            .filter(|task| statuses.contains(&task.status))
            .filter_map(TaskRecord::as_due)
            .filter(|task| targets.contains(&minute_floor(task.due_at)))
            .collect();

        let limit = page.limit.max(1);
        let items: Vec<DueTask> = matching.iter().skip(page.offset).take(limit).cloned().collect();
        let consumed = page.offset + items.len();
        let next = (consumed < matching.len()).then_some(PageRequest {
            offset: consumed,
            limit,
        });
        Ok(Page { items, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use ulid::Ulid;

    fn task_id(n: u128) -> TaskId {
        TaskId::from(Ulid(n))
    }

    fn due_task(n: u128, status: TaskStatus, due_at: DateTime<Utc>) -> TaskRecord {
        TaskRecord::new(task_id(n), format!("task {n}"), status).with_due_at(due_at)
    }

    #[tokio::test]
    async fn recurring_query_skips_completed_and_ruleless_tasks() {
        let rule = RawRepeatConfig {
            every_number: Some(1),
            every_unit: Some("day".to_string()),
            start_date: Some("2024-01-20".to_string()),
            ..RawRepeatConfig::default()
        };
        let store = InMemoryTaskStore::with_tasks([
            TaskRecord::new(task_id(1), "a", TaskStatus::Cancelled).with_repeat_config(rule.clone()),
            TaskRecord::new(task_id(2), "b", TaskStatus::Completed).with_repeat_config(rule),
            TaskRecord::new(task_id(3), "c", TaskStatus::Open),
        ]);

        let found = store.query_recurring_open_tasks().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, task_id(1));
    }

    #[tokio::test]
    async fn status_update_is_all_or_nothing() {
        let store = InMemoryTaskStore::with_tasks([TaskRecord::new(
            task_id(1),
            "a",
            TaskStatus::Cancelled,
        )]);

        let err = store
            .update_status(&[task_id(1), task_id(9)], TaskStatus::Open)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(task_id(9)));
        assert_eq!(store.get(task_id(1)).await.unwrap().status, TaskStatus::Cancelled);
        assert_eq!(store.status_writes().await, 0);

        store.update_status(&[task_id(1)], TaskStatus::Open).await.unwrap();
        assert_eq!(store.get(task_id(1)).await.unwrap().status, TaskStatus::Open);
        assert_eq!(store.status_writes().await, 1);
    }

    #[tokio::test]
    async fn due_query_pages_through_matches() {
        let now = Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap();
        let store = InMemoryTaskStore::with_tasks(
            (1..=5)
                .map(|n| due_task(n, TaskStatus::Open, now + TimeDelta::seconds(30)))
                .chain([due_task(6, TaskStatus::Completed, now)]),
        );

        let mut page = Some(PageRequest::first(2));
        let mut seen = Vec::new();
        while let Some(request) = page {
            let result = store
                .query_tasks_due_at(&[now], &TaskStatus::NOTIFIABLE, request)
                .await
                .unwrap();
            assert!(result.items.len() <= 2);
            seen.extend(result.items.into_iter().map(|task| task.id));
            page = result.next;
        }
        assert_eq!(seen, (1..=5).map(task_id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn injected_faults_surface_until_cleared() {
        let store = InMemoryTaskStore::new();
        store
            .fail_recurring_query(StoreError::Unavailable("down".to_string()))
            .await;
        assert!(store.query_recurring_open_tasks().await.is_err());

        store.clear_faults().await;
        assert!(store.query_recurring_open_tasks().await.unwrap().is_empty());
    }
}
