//! ReopenLedger port - タスクごとの「最後に reopen した日」
//!
//! 評価器は日付だけを見るので、同じ日に reopen を 2 回実行すると 2 回発火します。
//! ReopenLedger の watermark により、1 タスクにつき 1 日 1 回までに制限します。

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::TaskId;
use crate::ports::task_store::StoreError;

#[async_trait]
pub trait ReopenLedger: Send + Sync {
    /// Day the task was last reopened, if ever.
    async fn last_reopened(&self, id: TaskId) -> Result<Option<NaiveDate>, StoreError>;

    /// Records `day` as the last reopen day for every task in `ids`.
    async fn record_reopened(&self, ids: &[TaskId], day: NaiveDate) -> Result<(), StoreError>;
}
