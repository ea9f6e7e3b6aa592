//! 答案解析服务 - 业务能力层
//!
//! 按固定顺序尝试各个层级，直到拿到答案：
//! 1. 启发式预解析（只记录候选，不直接作答），以及关联内容获取
//! 2. 主模型（最多 3 次，指数退避）
//! 3. 备用模型（最多 2 次，同样的退避策略）
//! 4. 外部提供方（0-2 个，各调用一次，仅在限流或模型都不可用时）
//! 5. 启发式求解
//!
//! 每个层级的失败都在本地吸收，`resolve` 本身不会返回错误。

use std::sync::Arc;

use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{Config, ResolverConfig};
use crate::error::ModelErrorKind;
use crate::infrastructure::{ModelClient, ModelRequest, OpenAiModelClient};
use crate::models::{
    type_answer, AnswerValue, QuestionContext, QuestionKind, Resolution, ResolutionAttempt,
    ResolutionTier,
};
use crate::services::context_enricher::{ContextEnricher, LinkedContent};
use crate::services::heuristics::{self, PreParse};

/// 系统提示词
pub const SYSTEM_PROMPT: &str =
    "You are a data analysis expert. Solve the quiz question. Reply with the answer value only.";

/// 提示词中页面原始内容的最大字符数
pub const MAX_CONTEXT_CHARS: usize = 8000;

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// 单个层级的结果
#[derive(Debug, Clone, PartialEq)]
enum TierOutcome {
    Answered(AnswerValue),
    Failed(ModelErrorKind),
    /// 未配置，没有发起调用
    Unavailable,
}

/// 外部提供方（OpenAI 兼容接口）
struct ExternalProvider {
    tier: ResolutionTier,
    name: String,
    model: String,
    client: Arc<dyn ModelClient>,
}

/// 答案解析服务
///
/// 职责：
/// - 把题目上下文变成一个有类型的答案
/// - 记录每一次层级尝试
/// - 不关心提交和下一题
pub struct AnswerResolver {
    config: ResolverConfig,
    model_client: Option<Arc<dyn ModelClient>>,
    providers: Vec<ExternalProvider>,
    enricher: Option<Arc<ContextEnricher>>,
}

impl AnswerResolver {
    /// # 参数
    /// - `config`: 解析配置
    /// - `model_client`: 主模型与备用模型共用的客户端，`None` 表示没有配置模型
    /// - `provider_clients`: 与 `config.external_providers` 一一对应的客户端
    pub fn new(
        config: ResolverConfig,
        model_client: Option<Arc<dyn ModelClient>>,
        provider_clients: Vec<Arc<dyn ModelClient>>,
    ) -> Self {
        let providers = config
            .external_providers
            .iter()
            .zip(provider_clients)
            .enumerate()
            .filter_map(|(index, (provider, client))| {
                ResolutionTier::external(index).map(|tier| ExternalProvider {
                    tier,
                    name: provider.name.clone(),
                    model: provider.model.clone(),
                    client,
                })
            })
            .collect();

        Self {
            config,
            model_client,
            providers,
            enricher: None,
        }
    }

    /// 在调用模型前获取题目引用的网页、API 响应或文件
    pub fn with_enricher(mut self, enricher: Arc<ContextEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// 是否至少有一个模型层级可以调用
    fn has_model_tiers(&self) -> bool {
        let models_configured =
            !self.config.primary_model.is_empty() || !self.config.fallback_model.is_empty();
        (self.model_client.is_some() && models_configured) || !self.providers.is_empty()
    }

    /// 根据应用配置创建，API 密钥为空时不创建模型客户端
    pub fn from_config(config: &Config) -> Self {
        let resolver_config = config.resolver_config();

        let model_client: Option<Arc<dyn ModelClient>> = if config.llm_api_key.is_empty() {
            warn!("⚠️ 未配置 LLM API 密钥，模型层级不可用");
            None
        } else {
            Some(Arc::new(OpenAiModelClient::new(
                &config.llm_api_key,
                &config.llm_api_base_url,
                config.model_timeout(),
            )))
        };

        let provider_clients = resolver_config
            .external_providers
            .iter()
            .map(|p| {
                Arc::new(OpenAiModelClient::new(
                    &p.api_key,
                    &p.api_base_url,
                    config.model_timeout(),
                )) as Arc<dyn ModelClient>
            })
            .collect();

        Self::new(resolver_config, model_client, provider_clients)
    }

    /// 解析答案
    pub async fn resolve(&self, ctx: &QuestionContext) -> Resolution {
        let mut attempts = Vec::new();

        let parsed = if self.config.enable_heuristic_fallback {
            heuristics::pre_parse(&format!("{}\n{}", ctx.question_text, ctx.raw_page_content))
        } else {
            PreParse::default()
        };
        if let Some(sample) = &parsed.sample_answer {
            debug!("预解析发现示例答案: {}", sample);
        }
        let submission_url_hint = parsed
            .submission_url
            .as_deref()
            .and_then(|candidate| heuristics::resolve_url(&ctx.source_url, candidate));

        // 关联内容只给模型使用
        let linked = match &self.enricher {
            Some(enricher) if self.has_model_tiers() => enricher.enrich(ctx).await,
            _ => None,
        };

        let request = build_request(ctx, linked.as_ref());

        let primary = self
            .call_model_tier(
                ResolutionTier::PrimaryModel,
                &self.config.primary_model,
                self.config.primary_attempts,
                &request,
                &mut attempts,
            )
            .await;
        if let TierOutcome::Answered(answer) = primary {
            return Resolution {
                answer,
                attempts,
                submission_url_hint,
            };
        }

        let fallback = self
            .call_model_tier(
                ResolutionTier::FallbackModel,
                &self.config.fallback_model,
                self.config.fallback_attempts,
                &request,
                &mut attempts,
            )
            .await;
        if let TierOutcome::Answered(answer) = fallback {
            return Resolution {
                answer,
                attempts,
                submission_url_hint,
            };
        }

        let rate_limited = [&primary, &fallback]
            .iter()
            .any(|o| matches!(o, TierOutcome::Failed(ModelErrorKind::RateLimited)));
        let models_unavailable = primary == TierOutcome::Unavailable && fallback == TierOutcome::Unavailable;

        if rate_limited || models_unavailable {
            for provider in &self.providers {
                if let TierOutcome::Answered(answer) =
                    self.call_provider(provider, &request, &mut attempts).await
                {
                    return Resolution {
                        answer,
                        attempts,
                        submission_url_hint,
                    };
                }
            }
        } else if !self.providers.is_empty() {
            debug!("模型层级未被限流，跳过外部提供方");
        }

        let answer = if self.config.enable_heuristic_fallback {
            let answer = heuristics::heuristic_solve(&ctx.question_text, &ctx.raw_page_content, &parsed);
            info!("🧩 使用启发式答案: {}", answer);
            attempts.push(ResolutionAttempt::success(ResolutionTier::Heuristic));
            answer
        } else {
            warn!("❌ 所有层级都没有给出答案");
            AnswerValue::None
        };

        Resolution {
            answer,
            attempts,
            submission_url_hint,
        }
    }

    /// 调用主模型或备用模型，可重试错误按指数退避重试
    async fn call_model_tier(
        &self,
        tier: ResolutionTier,
        model: &str,
        max_attempts: u32,
        request: &ModelRequest,
        attempts: &mut Vec<ResolutionAttempt>,
    ) -> TierOutcome {
        let Some(client) = self.model_client.as_ref().filter(|_| !model.is_empty()) else {
            debug!("{} 未配置，跳过", tier);
            return TierOutcome::Unavailable;
        };

        let request = ModelRequest {
            model_id: model.to_string(),
            ..request.clone()
        };

        let mut outcome = TierOutcome::Unavailable;
        for attempt in 0..max_attempts {
            match client.complete(&request).await {
                Ok(response) => {
                    info!("✓ {} 给出答案 (第 {} 次尝试)", tier, attempt + 1);
                    attempts.push(ResolutionAttempt::success(tier));
                    return TierOutcome::Answered(type_answer(&response.content));
                }
                Err(e) => {
                    warn!("⚠️ {} 第 {}/{} 次调用失败: {}", tier, attempt + 1, max_attempts, e);
                    attempts.push(ResolutionAttempt::failure(tier, e.to_string()));
                    outcome = TierOutcome::Failed(e.kind);

                    if !e.kind.is_retryable() || attempt + 1 >= max_attempts {
                        break;
                    }
                    let delay = self.config.retry.delay_for(attempt);
                    debug!("等待 {:?} 后重试", delay);
                    sleep(delay).await;
                }
            }
        }

        outcome
    }

    /// 外部提供方只调用一次
    async fn call_provider(
        &self,
        provider: &ExternalProvider,
        request: &ModelRequest,
        attempts: &mut Vec<ResolutionAttempt>,
    ) -> TierOutcome {
        let request = ModelRequest {
            model_id: provider.model.clone(),
            ..request.clone()
        };

        match provider.client.complete(&request).await {
            Ok(response) => {
                info!("✓ 外部提供方 {} 给出答案", provider.name);
                attempts.push(ResolutionAttempt::success(provider.tier));
                TierOutcome::Answered(type_answer(&response.content))
            }
            Err(e) => {
                warn!("⚠️ 外部提供方 {} 调用失败: {}", provider.name, e);
                attempts.push(ResolutionAttempt::failure(provider.tier, e.to_string()));
                TierOutcome::Failed(e.kind)
            }
        }
    }
}

/// 构造模型请求（模型 ID 由调用方填入）
fn build_request(ctx: &QuestionContext, linked: Option<&LinkedContent>) -> ModelRequest {
    ModelRequest {
        model_id: String::new(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: build_user_prompt(ctx, linked),
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// 用户提示词：题干、题目类型、答案形式与上下文（含关联内容）
pub fn build_user_prompt(ctx: &QuestionContext, linked: Option<&LinkedContent>) -> String {
    let kind = QuestionKind::classify(&ctx.question_text);
    let raw: String = ctx.raw_page_content.chars().take(MAX_CONTEXT_CHARS).collect();
    let mut context = json!({
        "source_url": ctx.source_url,
        "submission_url": ctx.submission_url,
        "page_content": raw,
    });
    if let Some(linked) = linked {
        context["linked_content"] = json!({
            "kind": linked.kind.name(),
            "url": linked.url,
            "content": linked.content,
        });
    }
    let context = serde_json::to_string_pretty(&context).unwrap_or_else(|_| context.to_string());

    format!(
        "You are solving a data analysis quiz.\n\n\
         Question: {question}\n\
         Question type: {kind}\n\n\
         Context information:\n{context}\n\n\
         Analyze the question and provide the answer. The answer should be:\n\
         - A number (if asking for a sum, count, or value)\n\
         - A string (if asking for text or a name)\n\
         - A boolean (if asking yes/no)\n\
         - A JSON object (for complex data)\n\
         - A base64-encoded file URI (if asking to generate/attach a file)\n\n\
         IMPORTANT: Only provide the answer value, no explanation.",
        question = ctx.question_text,
    )
}
