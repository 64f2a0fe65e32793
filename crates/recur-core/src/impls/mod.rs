//! Implementations - 開発・テスト用の port 実装
//!
//! - **InMemoryTaskStore**: TaskStore のメモリ実装（障害注入つき）
//! - **InMemoryReopenLedger**: ReopenLedger のメモリ実装
//! - **TracingNotifier**: 通知をログに出すだけの Notifier

pub mod inmem_store;
pub mod ledger;
pub mod log_notifier;

pub use inmem_store::InMemoryTaskStore;
pub use ledger::InMemoryReopenLedger;
pub use log_notifier::TracingNotifier;
