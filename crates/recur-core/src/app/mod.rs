//! Application layer - reopen / due 通知のオーケストレーション
//!
//! - **reopen**: ReopenOrchestrator（1 日 1 回の reopen と occurrences の減算）
//! - **due**: 期限が horizon に入るタスクの選別
//! - **notify**: DueNotifier（選別したタスクを Notifier に渡す）
//! - **scheduler**: 定期実行ループ

pub mod due;
pub mod notify;
pub mod reopen;
pub mod scheduler;

pub use due::{fetch_due_tasks, select_due_within};
pub use notify::{DueNotifier, NotifyReport, reminder_text};
pub use reopen::{ReopenOrchestrator, ReopenReport};
pub use scheduler::Scheduler;
