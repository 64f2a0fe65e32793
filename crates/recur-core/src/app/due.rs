//! Due-task selection.
//!
//! A task is due within horizon `h` when its due timestamp, truncated to the
//! minute, equals `minute_floor(now) + h` exactly. Seconds on either side are
//! ignored, so a task due at 09:15:40 matches a run at 09:00:05 for `h = 15`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{DueHorizon, DueTask, TaskStatus, minute_floor};
use crate::ports::{PageRequest, StoreError, TaskStore};

/// Notify tick the exact-minute match relies on: one run per minute announces
/// each task once per horizon.
pub const NOTIFY_PERIOD: Duration = Duration::from_secs(60);

/// Partitions `tasks` by the horizon they fall in.
///
/// Every horizon in `horizons` is a key of the result, possibly with no tasks.
/// Tasks outside the notifiable statuses are dropped.
pub fn select_due_within(
    tasks: &[DueTask],
    now: DateTime<Utc>,
    horizons: &[DueHorizon],
) -> BTreeMap<DueHorizon, Vec<DueTask>> {
    let mut selected: BTreeMap<DueHorizon, Vec<DueTask>> =
        horizons.iter().map(|h| (*h, Vec::new())).collect();

    for (horizon, bucket) in selected.iter_mut() {
        let target = horizon.target(now);
        bucket.extend(
            tasks
                .iter()
                .filter(|task| task.status.is_notifiable())
                .filter(|task| minute_floor(task.due_at) == target)
                .cloned(),
        );
    }
    selected
}

/// Reads every page of tasks due at one of the horizon targets and partitions them.
pub async fn fetch_due_tasks(
    store: &dyn TaskStore,
    now: DateTime<Utc>,
    horizons: &[DueHorizon],
    page_size: usize,
) -> Result<BTreeMap<DueHorizon, Vec<DueTask>>, StoreError> {
    let targets: Vec<DateTime<Utc>> = horizons.iter().map(|h| h.target(now)).collect();

    let mut tasks = Vec::new();
    let mut page = Some(PageRequest::first(page_size));
    while let Some(request) = page {
        let result = store
            .query_tasks_due_at(&targets, &TaskStatus::NOTIFIABLE, request)
            .await?;
        tasks.extend(result.items);
        page = result.next;
    }

    Ok(select_due_within(&tasks, now, horizons))
}
