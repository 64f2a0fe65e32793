//! Notifier port - 通知の配送
//!
//! チャット webhook やメールなどの配送方式はこの crate の関心外です。
//! DueNotifier は `Notification` を組み立てて渡すだけです。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One message about one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub task_title: String,
    pub message_text: String,
    pub sender_label: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Notifier は 1 件の通知を配送
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}
