//! Schedule - 繰り返しルールの評価（純粋関数のみ）
//!
//! - **calendar**: 月の日数・うるう年・月差分などの日付演算
//! - **evaluator**: `should_fire_on` / `apply_firing` / `upcoming_firings`

pub mod calendar;
pub mod evaluator;

pub use self::evaluator::{apply_firing, should_fire_on, upcoming_firings};
