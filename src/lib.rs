//! # Quiz Chain Solver
//!
//! 沿着服务端给出的 URL 链自动答题：渲染题目页面、提取题干和提交地址、
//! 按层级解析答案、提交并根据结果决定下一题。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器、HTTP 客户端），只暴露能力
//! - `PageRenderer` - 渲染一个 URL，返回 HTML 与可见文本
//! - `ModelClient` - 一次模型调用，错误按种类区分
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单道题
//! - `PageExtractor` - 提取题干与提交地址
//! - `AnswerResolver` - 主模型 → 备用模型 → 外部提供方 → 启发式
//! - `AnswerSubmitter` - 提交答案并解读结果
//! - `RunReporter` - 写运行报告
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条 URL 链"的完整处理流程
//! - `QuizSequencer` - 预算检查 → 提取 → 解析 → 提交 → 下一题
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 初始化资源、装配组件
//! - `orchestrator/dispatcher` - 每个请求一个任务，维护提交记录表
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ResolverConfig};
pub use error::{AppError, AppResult};
pub use models::{AnswerValue, Identity, QuestionContext, RunStatus, SequenceRun, SubmissionVerdict};
pub use orchestrator::{App, Dispatcher};
pub use services::{AnswerResolver, AnswerSubmitter, ContextEnricher, PageExtractor};
pub use workflow::{QuizSequencer, SequenceBudget};
