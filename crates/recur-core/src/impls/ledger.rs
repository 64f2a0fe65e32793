//! InMemoryReopenLedger - ReopenLedger のメモリ実装

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::domain::TaskId;
use crate::ports::{ReopenLedger, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    last_reopened: HashMap<TaskId, NaiveDate>,
    read_fault: Option<StoreError>,
    write_fault: Option<StoreError>,
}

#[derive(Debug, Default)]
pub struct InMemoryReopenLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryReopenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `last_reopened` fails with `err` from now on.
    pub async fn fail_reads_with(&self, err: StoreError) {
        self.state.lock().await.read_fault = Some(err);
    }

    /// `record_reopened` fails with `err` from now on. Reads keep working.
    pub async fn fail_writes_with(&self, err: StoreError) {
        self.state.lock().await.write_fault = Some(err);
    }
}

#[async_trait]
impl ReopenLedger for InMemoryReopenLedger {
    async fn last_reopened(&self, id: TaskId) -> Result<Option<NaiveDate>, StoreError> {
        let state = self.state.lock().await;
        if let Some(err) = &state.read_fault {
            return Err(err.clone());
        }
        Ok(state.last_reopened.get(&id).copied())
    }

    async fn record_reopened(&self, ids: &[TaskId], day: NaiveDate) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(err) = &state.write_fault {
            return Err(err.clone());
        }
        for id in ids {
            // watermark は後退させない
            let entry = state.last_reopened.entry(*id).or_insert(day);
            *entry = (*entry).max(day);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[tokio::test]
    async fn watermark_only_moves_forward() {
        let ledger = InMemoryReopenLedger::new();
        let id = TaskId::from(Ulid(7));
        let jan_20 = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let jan_19 = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();

        assert_eq!(ledger.last_reopened(id).await.unwrap(), None);
        ledger.record_reopened(&[id], jan_20).await.unwrap();
        ledger.record_reopened(&[id], jan_19).await.unwrap();
        assert_eq!(ledger.last_reopened(id).await.unwrap(), Some(jan_20));
    }

    #[tokio::test]
    async fn write_fault_leaves_reads_working() {
        let ledger = InMemoryReopenLedger::new();
        let id = TaskId::from(Ulid(7));
        let day = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        ledger
            .fail_writes_with(StoreError::Unavailable("read-only".to_string()))
            .await;

        assert!(ledger.record_reopened(&[id], day).await.is_err());
        assert_eq!(ledger.last_reopened(id).await.unwrap(), None);
    }
}
