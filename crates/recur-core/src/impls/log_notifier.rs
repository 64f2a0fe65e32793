//! TracingNotifier - 通知を tracing のイベントとして出力する Notifier
//!
//! 配送先を持たない CLI デモ用です。

use async_trait::async_trait;

use crate::ports::{Notification, Notifier, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            target: "recur_core::notification",
            destination = %notification.destination,
            sender = %notification.sender_label,
            task = %notification.task_title,
            "{}",
            notification.message_text
        );
        Ok(())
    }
}
