use std::fmt;

use crate::models::answer::AnswerValue;

/// 答案解析层级，按尝试顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionTier {
    PrimaryModel,
    FallbackModel,
    ExternalProviderA,
    ExternalProviderB,
    Heuristic,
}

impl ResolutionTier {
    /// 第 `index` 个外部提供方对应的层级（最多两个）
    pub fn external(index: usize) -> Option<Self> {
        match index {
            0 => Some(ResolutionTier::ExternalProviderA),
            1 => Some(ResolutionTier::ExternalProviderB),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResolutionTier::PrimaryModel => "PRIMARY_MODEL",
            ResolutionTier::FallbackModel => "FALLBACK_MODEL",
            ResolutionTier::ExternalProviderA => "EXTERNAL_PROVIDER_A",
            ResolutionTier::ExternalProviderB => "EXTERNAL_PROVIDER_B",
            ResolutionTier::Heuristic => "HEURISTIC",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单次尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Error,
}

/// 一次层级尝试的诊断记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
    pub tier: ResolutionTier,
    pub outcome: AttemptOutcome,
    pub error_detail: Option<String>,
}

impl ResolutionAttempt {
    pub fn success(tier: ResolutionTier) -> Self {
        Self {
            tier,
            outcome: AttemptOutcome::Success,
            error_detail: None,
        }
    }

    pub fn failure(tier: ResolutionTier, detail: impl Into<String>) -> Self {
        Self {
            tier,
            outcome: AttemptOutcome::Error,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// 一次 resolve 调用的完整输出
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub answer: AnswerValue,
    /// 按时间顺序记录的尝试
    pub attempts: Vec<ResolutionAttempt>,
    /// 启发式预解析发现的提交地址
    pub submission_url_hint: Option<String>,
}

impl Resolution {
    /// 给出最终答案的层级
    pub fn answered_by(&self) -> Option<ResolutionTier> {
        if self.answer.is_none() {
            return None;
        }
        self.attempts
            .iter()
            .rev()
            .find(|a| a.is_success())
            .map(|a| a.tier)
    }

    /// 某层级的尝试次数
    pub fn attempts_for(&self, tier: ResolutionTier) -> usize {
        self.attempts.iter().filter(|a| a.tier == tier).count()
    }
}
