//! 流程步骤的抽象
//!
//! QuizSequencer 只依赖这些 trait，具体实现由编排层注入

use std::time::Instant;

use async_trait::async_trait;

use crate::error::SequenceFatalError;
use crate::models::{AnswerValue, Identity, QuestionContext, Resolution, SubmissionVerdict};
use crate::services::{AnswerResolver, AnswerSubmitter, PageExtractor};

/// 提取题目
#[async_trait]
pub trait ExtractQuestion: Send + Sync {
    async fn extract(&self, url: &str) -> Result<QuestionContext, SequenceFatalError>;
}

/// 解析答案
#[async_trait]
pub trait ResolveAnswer: Send + Sync {
    async fn resolve(&self, ctx: &QuestionContext) -> Resolution;
}

/// 提交答案
#[async_trait]
pub trait SubmitAnswer: Send + Sync {
    async fn submit(
        &self,
        url: &str,
        answer: &AnswerValue,
        context_url: &str,
        identity: &Identity,
    ) -> SubmissionVerdict;
}

/// 时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 系统单调时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[async_trait]
impl ExtractQuestion for PageExtractor {
    async fn extract(&self, url: &str) -> Result<QuestionContext, SequenceFatalError> {
        PageExtractor::extract(self, url).await
    }
}

#[async_trait]
impl ResolveAnswer for AnswerResolver {
    async fn resolve(&self, ctx: &QuestionContext) -> Resolution {
        AnswerResolver::resolve(self, ctx).await
    }
}

#[async_trait]
impl SubmitAnswer for AnswerSubmitter {
    async fn submit(
        &self,
        url: &str,
        answer: &AnswerValue,
        context_url: &str,
        identity: &Identity,
    ) -> SubmissionVerdict {
        AnswerSubmitter::submit(self, url, answer, context_url, identity).await
    }
}
