//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（タスクストア、通知配送、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod reopen_ledger;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{Notification, Notifier, NotifyError};
pub use self::reopen_ledger::ReopenLedger;
pub use self::task_store::{Page, PageRequest, StoreError, TaskStore};
