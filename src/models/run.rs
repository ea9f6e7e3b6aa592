use std::fmt;

use chrono::{DateTime, Local};

/// 提交身份
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }
}

// 日志里不输出 secret
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("email", &self.email)
            .field("secret", &"***")
            .finish()
    }
}

/// 序列运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Completed,
    TimedOut,
    Exhausted,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn name(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::TimedOut => "timed_out",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次序列运行的记录，只由所属的 QuizSequencer 修改
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRun {
    pub submission_id: String,
    pub start_time: DateTime<Local>,
    /// 已完成（并继续）的迭代次数
    pub attempts: u32,
    pub status: RunStatus,
    /// 停止时正在处理的 URL
    pub last_url: String,
    /// 停止原因
    pub detail: Option<String>,
}

impl SequenceRun {
    pub fn new(submission_id: impl Into<String>, initial_url: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            start_time: Local::now(),
            attempts: 0,
            status: RunStatus::Running,
            last_url: initial_url.into(),
            detail: None,
        }
    }

    /// 进入终止状态
    pub fn finish(&mut self, status: RunStatus, detail: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.detail = detail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_debug_hides_secret() {
        let identity = Identity::new("a@b.c", "hunter2");
        let printed = format!("{:?}", identity);
        assert!(printed.contains("a@b.c"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_new_run_is_running() {
        let run = SequenceRun::new("id-1", "https://x/start");
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.attempts, 0);
        assert_eq!(run.last_url, "https://x/start");
    }

    #[test]
    fn test_finish_sets_terminal_status() {
        let mut run = SequenceRun::new("id-1", "https://x/start");
        run.finish(RunStatus::Exhausted, Some("budget".to_string()));
        assert!(run.status.is_terminal());
        assert_eq!(run.detail.as_deref(), Some("budget"));
    }

    #[test]
    fn test_run_records_local_start_time() {
        let before = Local::now();
        let run = SequenceRun::new("id-2", "https://x/start");
        assert!(run.start_time >= before);
        assert!(run.start_time <= Local::now());
        assert_eq!(run.clone(), run);
    }
}
