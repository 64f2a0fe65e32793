//! Task records exchanged with the task store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::raw::RawRepeatConfig;
use super::status::TaskStatus;

/// Reopen candidate: a task carrying a repeat config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTask {
    pub id: TaskId,
    pub status: TaskStatus,
    pub rule: RawRepeatConfig,
}

/// Task with a due timestamp, as seen by the due-task selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueTask {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub due_at: DateTime<Utc>,
}

/// Full task row (the subset of columns this crate reads or writes).
///
/// Used by the in-memory store and by the CLI fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::raw::deserialize_repeat_config"
    )]
    pub repeat_config: Option<RawRepeatConfig>,
}

impl TaskRecord {
    pub fn new(id: TaskId, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id,
            title: title.into(),
            status,
            due_at: None,
            repeat_config: None,
        }
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_repeat_config(mut self, config: RawRepeatConfig) -> Self {
        self.repeat_config = Some(config);
        self
    }

    /// Present only when the task carries a repeat config.
    pub fn as_recurring(&self) -> Option<RecurringTask> {
        self.repeat_config.as_ref().map(|rule| RecurringTask {
            id: self.id,
            status: self.status,
            rule: rule.clone(),
        })
    }

    /// Present only when the task has a due timestamp.
    pub fn as_due(&self) -> Option<DueTask> {
        self.due_at.map(|due_at| DueTask {
            id: self.id,
            title: self.title.clone(),
            status: self.status,
            due_at,
        })
    }
}
