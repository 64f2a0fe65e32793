//! Domain model (IDs, task status, recurrence rules, due horizons).
//!
//! - ids: TaskId / RunId
//! - status: タスクの状態（CRUD 層と共有する語彙）
//! - rule: 型付きの繰り返しルール
//! - raw: CRUD 層の payload と境界での検証
//! - task: TaskStore とやり取りするレコード
//! - horizon: 通知の先読み幅

pub mod horizon;
pub mod ids;
pub mod raw;
pub mod rule;
pub mod status;
pub mod task;

pub use horizon::{DueHorizon, minute_floor};
pub use ids::{RunId, TaskId};
pub use raw::RawRepeatConfig;
pub use rule::{Cadence, EndPolicy, Interval, IntervalUnit, RecurrenceRule, RuleError, WeekdaySet};
pub use status::TaskStatus;
pub use task::{DueTask, RecurringTask, TaskRecord};
