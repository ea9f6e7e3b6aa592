//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 持有浏览器资源并装配各个组件
//!
//! ### `dispatcher` - 序列调度器
//! - 为每个答题请求启动独立任务
//! - 维护只插入的提交记录表
//! - 序列结束后写运行报告
//!
//! ## 层次关系
//!
//! ```text
//! app (装配 + 等待)
//!     ↓
//! dispatcher (每个请求一个任务)
//!     ↓
//! workflow::QuizSequencer (一条 URL 链)
//!     ↓
//! services (能力层：extract / resolve / submit / report)
//!     ↓
//! infrastructure (基础设施：renderer / model client)
//! ```

pub mod app;
pub mod dispatcher;

pub use app::App;
pub use dispatcher::{submission_id_for, Dispatcher, SubmissionTracker};
