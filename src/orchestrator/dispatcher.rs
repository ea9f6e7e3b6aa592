//! 序列调度器 - 编排层
//!
//! 每个答题请求对应一个独立的 tokio 任务；任务之间唯一共享的是
//! 只插入不修改的提交记录表（submission_id → 开始时间）

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::{Identity, SequenceRun};
use crate::services::RunReporter;
use crate::workflow::QuizSequencer;

/// 提交记录表
#[derive(Debug, Default)]
pub struct SubmissionTracker {
    entries: RwLock<HashMap<String, DateTime<Local>>>,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录开始时间，已存在时保留原值并返回 false
    pub fn insert(&self, submission_id: &str, started_at: DateTime<Local>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(submission_id) {
            return false;
        }
        entries.insert(submission_id.to_string(), started_at);
        true
    }

    pub fn started_at(&self, submission_id: &str) -> Option<DateTime<Local>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(submission_id)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 根据题目 URL 和时间生成提交 ID
pub fn submission_id_for(url: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", url, at.timestamp())
}

/// 序列调度器
///
/// - 不等待序列结束，立即返回任务句柄
/// - 序列结束后写日志和运行报告
pub struct Dispatcher {
    sequencer: Arc<QuizSequencer>,
    tracker: Arc<SubmissionTracker>,
    reporter: Option<Arc<RunReporter>>,
}

impl Dispatcher {
    pub fn new(sequencer: Arc<QuizSequencer>, reporter: Option<Arc<RunReporter>>) -> Self {
        Self {
            sequencer,
            tracker: Arc::new(SubmissionTracker::new()),
            reporter,
        }
    }

    pub fn tracker(&self) -> Arc<SubmissionTracker> {
        self.tracker.clone()
    }

    /// 启动一条答题序列（必须在 tokio 运行时内调用）
    pub fn start_sequence(
        &self,
        initial_url: &str,
        submission_id: &str,
        identity: Identity,
    ) -> JoinHandle<SequenceRun> {
        if !self.tracker.insert(submission_id, Local::now()) {
            warn!("⚠️ 提交 ID 重复: {}", submission_id);
        }

        let sequencer = self.sequencer.clone();
        let reporter = self.reporter.clone();
        let initial_url = initial_url.to_string();
        let submission_id = submission_id.to_string();

        tokio::spawn(async move {
            let run = sequencer.run(&initial_url, &submission_id, &identity).await;

            info!(
                "[run {}] 🏁 序列结束: {} (尝试 {} 次)",
                run.submission_id, run.status, run.attempts
            );
            if let Some(reporter) = reporter {
                if let Err(e) = reporter.record(&run) {
                    error!("[run {}] 写入运行报告失败: {}", run.submission_id, e);
                }
            }

            run
        })
    }

    /// 生成提交 ID 并启动序列
    pub fn accept(&self, initial_url: &str, identity: Identity) -> (String, JoinHandle<SequenceRun>) {
        let submission_id = submission_id_for(initial_url, Local::now());
        info!("📨 接受答题请求: {}", submission_id);
        let handle = self.start_sequence(initial_url, &submission_id, identity);
        (submission_id, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tracker_is_insert_only() {
        let tracker = SubmissionTracker::new();
        let first = Local.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let later = Local.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        assert!(tracker.insert("a", first));
        assert!(!tracker.insert("a", later));
        assert_eq!(tracker.started_at("a"), Some(first));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.started_at("b"), None);
    }

    #[test]
    fn test_submission_id_format() {
        let at = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(
            submission_id_for("https://x/quiz", at),
            "https://x/quiz_1700000000"
        );
    }
}
