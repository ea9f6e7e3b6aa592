//! 运行报告服务 - 业务能力层
//!
//! 只负责"把一次序列运行的结果追加到报告文件"

use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::SequenceRun;

/// 运行报告
pub struct RunReporter {
    path: String,
}

impl RunReporter {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 写入报告文件头（覆盖已有内容）
    pub fn init(&self) -> AppResult<()> {
        let header = format!(
            "{}\n答题序列运行日志 - {}\n{}\n\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        fs::write(&self.path, header).map_err(|e| AppError::file_failed(self.path.as_str(), e))
    }

    /// 追加一条运行记录
    pub fn record(&self, run: &SequenceRun) -> AppResult<()> {
        debug!("写入运行记录: {}", run.submission_id);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::file_failed(self.path.as_str(), e))?;

        file.write_all(format_run(run).as_bytes())
            .map_err(|e| AppError::file_failed(self.path.as_str(), e))
    }
}

fn format_run(run: &SequenceRun) -> String {
    let mut line = format!(
        "{} | {} | 状态: {} | 尝试: {} | 最后地址: {}",
        run.start_time.format("%Y-%m-%d %H:%M:%S"),
        run.submission_id,
        run.status,
        run.attempts,
        run.last_url
    );
    if let Some(detail) = &run.detail {
        line.push_str(&format!(" | 详情: {}", detail));
    }
    line.push('\n');
    line
}
