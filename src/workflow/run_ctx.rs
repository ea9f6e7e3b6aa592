//! 序列运行上下文
//!
//! 封装"我正在处理哪一次提交的第几题"这一信息

use std::fmt::{self, Display};

/// 序列运行上下文（仅用于日志）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCtx {
    /// 提交 ID
    pub submission_id: String,

    /// 当前迭代序号（从 1 开始）
    pub iteration: u32,
}

impl RunCtx {
    pub fn new(submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            iteration: 1,
        }
    }

    /// 进入下一次迭代
    pub fn advance(&mut self) {
        self.iteration += 1;
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[run {} #{}]", self.submission_id, self.iteration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tracks_iteration() {
        let mut ctx = RunCtx::new("abc");
        assert_eq!(ctx.to_string(), "[run abc #1]");
        ctx.advance();
        assert_eq!(ctx.to_string(), "[run abc #2]");
    }
}
