//! recur-core
//!
//! Recurrence engine and due-task notifier for a personal task manager.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, rule, raw, task, horizon）
//! - **schedule**: 暦の計算と繰り返しルールの評価（純粋関数）
//! - **ports**: 抽象化レイヤー（TaskStore, Notifier, ReopenLedger, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（reopen, due, notify, scheduler）
//! - **impls**: 実装（InMemoryTaskStore など開発用）
//! - **config**: 環境変数からの設定
//! - **error**: crate 全体のエラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod schedule;

pub use config::{ConfigError, RecurConfig};
pub use error::{RecurError, Result};
