//! 答题序列 - 流程层
//!
//! 核心职责：沿着服务端给出的 URL 链逐题作答
//!
//! 每次迭代：
//! 1. 超时检查 → TIMED_OUT
//! 2. 次数检查 → EXHAUSTED
//! 3. 提取题目（URL 无效 → ERROR）
//! 4. 解析答案
//! 5. 提交答案
//! 6. 根据 verdict 决定下一题或结束

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::SequenceFatalError;
use crate::models::{Identity, RunStatus, SequenceRun, SubmissionVerdict};
use crate::utils::logging::truncate_text;
use crate::workflow::run_ctx::RunCtx;
use crate::workflow::steps::{Clock, ExtractQuestion, ResolveAnswer, SubmitAnswer, SystemClock};

/// 一次序列运行的预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceBudget {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl SequenceBudget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            timeout: config.timeout_budget(),
        }
    }
}

impl Default for SequenceBudget {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            timeout: Duration::from_secs(180),
        }
    }
}

/// 单次迭代后的走向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// 继续处理给定 URL
    Continue(String),
    /// 终止
    Stop(RunStatus, Option<String>),
}

/// 根据提交结果决定下一步
///
/// 有下一题地址就继续（答错时视为纠正跳转），否则结束；答错且没有地址时不重试
pub fn decide_next(verdict: &SubmissionVerdict) -> StepOutcome {
    let next_url = verdict
        .next_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    match (verdict.correct, next_url) {
        (_, Some(url)) => StepOutcome::Continue(url.to_string()),
        (true, None) => StepOutcome::Stop(RunStatus::Completed, None),
        (false, None) => StepOutcome::Stop(
            RunStatus::Completed,
            Some(format!(
                "答案错误且没有下一题: {}",
                verdict.reason.as_deref().unwrap_or("无原因")
            )),
        ),
    }
}

/// 答题序列
///
/// - 持有步骤实现的共享引用，不持有浏览器等资源
/// - 每次 run 的状态都在 SequenceRun 中，多个 run 之间互不影响
pub struct QuizSequencer {
    extractor: Arc<dyn ExtractQuestion>,
    resolver: Arc<dyn ResolveAnswer>,
    submitter: Arc<dyn SubmitAnswer>,
    clock: Arc<dyn Clock>,
    budget: SequenceBudget,
}

impl QuizSequencer {
    pub fn new(
        extractor: Arc<dyn ExtractQuestion>,
        resolver: Arc<dyn ResolveAnswer>,
        submitter: Arc<dyn SubmitAnswer>,
        budget: SequenceBudget,
    ) -> Self {
        Self::with_clock(extractor, resolver, submitter, budget, Arc::new(SystemClock))
    }

    pub fn with_clock(
        extractor: Arc<dyn ExtractQuestion>,
        resolver: Arc<dyn ResolveAnswer>,
        submitter: Arc<dyn SubmitAnswer>,
        budget: SequenceBudget,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            extractor,
            resolver,
            submitter,
            clock,
            budget,
        }
    }

    pub fn budget(&self) -> SequenceBudget {
        self.budget
    }

    /// 运行一条答题序列直到终止
    pub async fn run(&self, initial_url: &str, submission_id: &str, identity: &Identity) -> SequenceRun {
        let started = self.clock.now();
        let mut run = SequenceRun::new(submission_id, initial_url);
        let mut ctx = RunCtx::new(submission_id);
        let mut current_url = initial_url.to_string();

        info!("{} 🚀 开始答题序列: {}", ctx, initial_url);

        loop {
            run.last_url = current_url.clone();

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= self.budget.timeout {
                warn!("{} ⏱️ 超出时间预算 ({:?})，停止", ctx, self.budget.timeout);
                run.finish(RunStatus::TimedOut, None);
                break;
            }
            if run.attempts >= self.budget.max_attempts {
                warn!("{} ⚠️ 已达到最大尝试次数 {}，停止", ctx, self.budget.max_attempts);
                run.finish(RunStatus::Exhausted, None);
                break;
            }

            match self.step(&ctx, &current_url, identity).await {
                Ok(StepOutcome::Continue(next_url)) => {
                    run.attempts += 1;
                    info!("{} ➡️ 下一题: {}", ctx, next_url);
                    current_url = next_url;
                    ctx.advance();
                }
                Ok(StepOutcome::Stop(status, detail)) => {
                    info!("{} ✓ 序列结束: {}", ctx, status);
                    run.finish(status, detail);
                    break;
                }
                Err(e) => {
                    error!("{} ❌ 无法继续: {}", ctx, e);
                    run.finish(RunStatus::Error, Some(e.to_string()));
                    break;
                }
            }
        }

        run
    }

    /// 单次迭代：提取 → 解析 → 提交 → 决策
    async fn step(
        &self,
        ctx: &RunCtx,
        url: &str,
        identity: &Identity,
    ) -> Result<StepOutcome, SequenceFatalError> {
        info!("{} 📄 提取题目: {}", ctx, url);
        let question = self.extractor.extract(url).await?;
        if question.is_degraded() {
            warn!("{} ⚠️ 题目内容为空，继续尝试作答", ctx);
        } else {
            info!("{} 题干: {}", ctx, truncate_text(&question.question_text, 120));
        }

        let resolution = self.resolver.resolve(&question).await;
        match resolution.answered_by() {
            Some(tier) => info!("{} 🧠 答案来自 {}: {}", ctx, tier, resolution.answer),
            None => warn!("{} ⚠️ 没有得到答案，提交空答案", ctx),
        }

        let submit_url = resolution
            .submission_url_hint
            .as_deref()
            .unwrap_or(&question.submission_url);
        let verdict = self
            .submitter
            .submit(submit_url, &resolution.answer, &question.source_url, identity)
            .await;

        if verdict.correct {
            info!("{} ✅ 回答正确", ctx);
        } else {
            warn!(
                "{} ❌ 回答错误: {}",
                ctx,
                verdict.reason.as_deref().unwrap_or("无原因")
            );
        }

        Ok(decide_next(&verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;

    use crate::models::{AnswerValue, QuestionContext, Resolution, ResolutionAttempt, ResolutionTier};

    /// 只在被推进时前进的时钟
    struct FakeClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            })
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    /// 记录访问过的 URL，每次调用推进时钟
    struct CountingExtractor {
        clock: Arc<FakeClock>,
        step: Duration,
        visited: Mutex<Vec<String>>,
    }

    impl CountingExtractor {
        fn new(clock: Arc<FakeClock>, step: Duration) -> Arc<Self> {
            Arc::new(Self {
                clock,
                step,
                visited: Mutex::new(Vec::new()),
            })
        }

        fn visited(&self) -> Vec<String> {
            self.visited.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExtractQuestion for CountingExtractor {
        async fn extract(&self, url: &str) -> Result<QuestionContext, SequenceFatalError> {
            self.visited.lock().unwrap().push(url.to_string());
            self.clock.advance(self.step);
            if url == "broken" {
                return Err(SequenceFatalError::InvalidUrl {
                    url: url.to_string(),
                    reason: "relative URL without a base".to_string(),
                });
            }
            Ok(QuestionContext {
                question_text: format!("question at {url}"),
                raw_page_content: String::new(),
                source_url: url.to_string(),
                submission_url: format!("{url}/submit"),
            })
        }
    }

    struct FixedResolver {
        hint: Option<String>,
    }

    #[async_trait]
    impl ResolveAnswer for FixedResolver {
        async fn resolve(&self, _ctx: &QuestionContext) -> Resolution {
            Resolution {
                answer: AnswerValue::Integer(42),
                attempts: vec![ResolutionAttempt::success(ResolutionTier::PrimaryModel)],
                submission_url_hint: self.hint.clone(),
            }
        }
    }

    /// 按顺序返回预设 verdict，用完后一直返回最后一个
    struct ScriptedSubmitter {
        verdicts: Mutex<Vec<SubmissionVerdict>>,
        targets: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSubmitter {
        fn new(verdicts: Vec<SubmissionVerdict>) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts),
                targets: Mutex::new(Vec::new()),
            })
        }

        fn targets(&self) -> Vec<(String, String)> {
            self.targets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubmitAnswer for ScriptedSubmitter {
        async fn submit(
            &self,
            url: &str,
            _answer: &AnswerValue,
            context_url: &str,
            _identity: &Identity,
        ) -> SubmissionVerdict {
            self.targets
                .lock()
                .unwrap()
                .push((url.to_string(), context_url.to_string()));
            let mut verdicts = self.verdicts.lock().unwrap();
            if verdicts.len() > 1 {
                verdicts.remove(0)
            } else {
                verdicts[0].clone()
            }
        }
    }

    fn verdict(correct: bool, next_url: Option<&str>) -> SubmissionVerdict {
        SubmissionVerdict {
            correct,
            next_url: next_url.map(str::to_string),
            ..SubmissionVerdict::default()
        }
    }

    fn sequencer(
        extractor: Arc<CountingExtractor>,
        submitter: Arc<ScriptedSubmitter>,
        clock: Arc<FakeClock>,
        hint: Option<&str>,
    ) -> QuizSequencer {
        QuizSequencer::with_clock(
            extractor,
            Arc::new(FixedResolver {
                hint: hint.map(str::to_string),
            }),
            submitter,
            SequenceBudget::default(),
            clock,
        )
    }

    fn identity() -> Identity {
        Identity::new("me@example.com", "s3cret")
    }

    #[test]
    fn test_decide_next() {
        assert_eq!(
            decide_next(&verdict(true, Some("https://x/2"))),
            StepOutcome::Continue("https://x/2".to_string())
        );
        assert_eq!(
            decide_next(&verdict(false, Some("https://x/next"))),
            StepOutcome::Continue("https://x/next".to_string())
        );
        assert_eq!(
            decide_next(&verdict(true, None)),
            StepOutcome::Stop(RunStatus::Completed, None)
        );
        assert_eq!(
            decide_next(&verdict(true, Some("  "))),
            StepOutcome::Stop(RunStatus::Completed, None)
        );
        assert!(matches!(
            decide_next(&verdict(false, None)),
            StepOutcome::Stop(RunStatus::Completed, Some(_))
        ));
    }

    #[tokio::test]
    async fn test_correct_without_next_completes() {
        let clock = FakeClock::new();
        let extractor = CountingExtractor::new(clock.clone(), Duration::from_secs(1));
        let submitter = ScriptedSubmitter::new(vec![verdict(true, None)]);
        let seq = sequencer(extractor.clone(), submitter, clock, None);

        let run = seq.run("https://x/1", "sub-1", &identity()).await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempts, 0);
        assert_eq!(extractor.visited(), vec!["https://x/1"]);
    }

    #[tokio::test]
    async fn test_incorrect_with_next_follows_redirect() {
        let clock = FakeClock::new();
        let extractor = CountingExtractor::new(clock.clone(), Duration::from_secs(1));
        let submitter = ScriptedSubmitter::new(vec![
            verdict(false, Some("https://x/next")),
            verdict(false, None),
        ]);
        let seq = sequencer(extractor.clone(), submitter, clock, None);

        let run = seq.run("https://x/1", "sub-2", &identity()).await;

        assert_eq!(extractor.visited(), vec!["https://x/1", "https://x/next"]);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempts, 1);
        assert_eq!(run.last_url, "https://x/next");
        assert!(run.detail.is_some());
    }

    #[tokio::test]
    async fn test_attempt_cap_stops_at_ten() {
        let clock = FakeClock::new();
        let extractor = CountingExtractor::new(clock.clone(), Duration::from_secs(1));
        let submitter = ScriptedSubmitter::new(vec![verdict(true, Some("https://x/loop"))]);
        let seq = sequencer(extractor.clone(), submitter, clock, None);

        let run = seq.run("https://x/1", "sub-3", &identity()).await;

        assert_eq!(run.status, RunStatus::Exhausted);
        assert_eq!(run.attempts, 10);
        assert_eq!(extractor.visited().len(), 10);
    }

    #[tokio::test]
    async fn test_deadline_stops_before_next_iteration() {
        let clock = FakeClock::new();
        let extractor = CountingExtractor::new(clock.clone(), Duration::from_secs(50));
        let submitter = ScriptedSubmitter::new(vec![verdict(true, Some("https://x/loop"))]);
        let seq = sequencer(extractor.clone(), submitter, clock, None);

        let run = seq.run("https://x/1", "sub-4", &identity()).await;

        // 0s、50s、100s、150s 各执行一次，200s 时停止
        assert_eq!(run.status, RunStatus::TimedOut);
        assert_eq!(extractor.visited().len(), 4);
        assert_eq!(run.attempts, 4);
    }

    #[tokio::test]
    async fn test_fatal_extraction_is_error() {
        let clock = FakeClock::new();
        let extractor = CountingExtractor::new(clock.clone(), Duration::ZERO);
        let submitter = ScriptedSubmitter::new(vec![verdict(true, Some("broken"))]);
        let seq = sequencer(extractor.clone(), submitter, clock, None);

        let run = seq.run("https://x/1", "sub-5", &identity()).await;

        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.attempts, 1);
        assert_eq!(run.last_url, "broken");
        assert!(run.detail.unwrap().contains("broken"));
    }

    #[tokio::test]
    async fn test_submission_url_prefers_hint() {
        let clock = FakeClock::new();
        let extractor = CountingExtractor::new(clock.clone(), Duration::ZERO);
        let submitter = ScriptedSubmitter::new(vec![verdict(true, Some("https://x/2")), verdict(true, None)]);
        let seq = sequencer(extractor, submitter.clone(), clock.clone(), Some("https://x/submit"));
        seq.run("https://x/1", "sub-6", &identity()).await;
        assert_eq!(
            submitter.targets(),
            vec![
                ("https://x/submit".to_string(), "https://x/1".to_string()),
                ("https://x/submit".to_string(), "https://x/2".to_string()),
            ]
        );

        let extractor = CountingExtractor::new(clock.clone(), Duration::ZERO);
        let submitter = ScriptedSubmitter::new(vec![verdict(true, None)]);
        let seq = sequencer(extractor, submitter.clone(), clock, None);
        seq.run("https://x/1", "sub-7", &identity()).await;
        assert_eq!(
            submitter.targets(),
            vec![("https://x/1/submit".to_string(), "https://x/1".to_string())]
        );
    }
}
