//! TaskStore port - タスクの正本（source of truth）
//!
//! 永続化技術はこの crate の関心外です。ここでは reopen と due 通知が
//! 必要とする最小限の読み書きだけを定義します。
//!
//! # 実装
//! - `impls::InMemoryTaskStore`（テスト・デモ用）
//! - 本番実装（ホスト型 RDB など）は別クレートに置く想定

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DueTask, RawRepeatConfig, RecurringTask, TaskId, TaskStatus};

/// Storage failures surfaced to the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task store rejected the write: {0}")]
    Rejected(String),
}

/// Cursor for paginated reads. `offset` is opaque to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: limit.max(1),
        }
    }
}

/// One page of results plus the cursor for the next page (None on the last page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageRequest>,
}

/// TaskStore は reopen / due 通知のための読み書きを提供
///
/// # 設計原則
/// - 読み取り→書き込みの間に楽観ロックはない（last-write-wins を許容）
/// - `update_status` はバルク、`update_recurrence_rule` はタスク単位
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks that carry a repeat config and are not completed.
    async fn query_recurring_open_tasks(&self) -> Result<Vec<RecurringTask>, StoreError>;

    /// Sets `status` on every task in `ids` in one write.
    async fn update_status(&self, ids: &[TaskId], status: TaskStatus) -> Result<(), StoreError>;

    /// Replaces the repeat config of a single task.
    async fn update_recurrence_rule(
        &self,
        id: TaskId,
        rule: RawRepeatConfig,
    ) -> Result<(), StoreError>;

    /// Tasks due at one of `timestamps` (minute precision) with a status in `statuses`.
    async fn query_tasks_due_at(
        &self,
        timestamps: &[DateTime<Utc>],
        statuses: &[TaskStatus],
        page: PageRequest,
    ) -> Result<Page<DueTask>, StoreError>;
}
