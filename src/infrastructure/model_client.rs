//! 模型调用 - 基础设施层
//!
//! 定义模型调用的契约，并提供 OpenAI 兼容接口的实现
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（主模型、备用模型和外部提供方共用）

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ModelError, ModelErrorKind};

/// 一次模型请求
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 模型响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub content: String,
}

/// 模型调用能力
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

/// OpenAI 兼容接口的模型客户端
pub struct OpenAiModelClient {
    client: Client<OpenAIConfig>,
    call_timeout: Duration,
}

impl OpenAiModelClient {
    /// # 参数
    /// - `api_key`: API 密钥
    /// - `api_base_url`: API 基础 URL
    /// - `call_timeout`: 单次调用超时
    pub fn new(api_key: &str, api_base_url: &str, call_timeout: Duration) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base_url);

        Self {
            client: Client::with_config(openai_config),
            call_timeout,
        }
    }

    fn build_messages(
        &self,
        request: &ModelRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut messages = Vec::new();

        if !request.system_prompt.is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.as_str())
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_prompt.as_str())
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let model = request.model_id.as_str();
        debug!("调用模型 API，模型: {}", model);
        debug!("用户消息长度: {} 字符", request.user_prompt.len());

        let messages = self
            .build_messages(request)
            .map_err(|e| to_model_error(model, e))?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| to_model_error(model, e))?;

        let response = tokio::time::timeout(self.call_timeout, self.client.chat().create(chat_request))
            .await
            .map_err(|_| {
                ModelError::new(
                    ModelErrorKind::Transient,
                    model,
                    format!("调用超时 ({}s)", self.call_timeout.as_secs()),
                )
            })?
            .map_err(|e| {
                warn!("模型 API 调用失败: {}", e);
                to_model_error(model, e)
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ModelError::new(ModelErrorKind::Other, model, "模型返回内容为空"))?;

        debug!("模型 API 调用成功");

        Ok(ModelResponse { content })
    }
}

fn to_model_error(model: &str, err: OpenAIError) -> ModelError {
    let kind = match &err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_ref().map(ToString::to_string).unwrap_or_default();
            let error_type = api.r#type.as_ref().map(ToString::to_string).unwrap_or_default();
            classify_api_error(&code, &error_type, &api.message)
        }
        OpenAIError::Reqwest(_) => ModelErrorKind::Transient,
        _ => ModelErrorKind::Other,
    };
    ModelError::new(kind, model, err.to_string())
}

/// 根据 API 返回的 code / type / message 判断错误种类
pub fn classify_api_error(code: &str, error_type: &str, message: &str) -> ModelErrorKind {
    let haystack = format!("{} {} {}", code, error_type, message).to_lowercase();

    if haystack.contains("model_not_found") || haystack.contains("does not exist") {
        return ModelErrorKind::ModelNotFound;
    }
    if haystack.contains("rate_limit")
        || haystack.contains("rate limit")
        || haystack.contains("insufficient_quota")
        || haystack.contains("quota")
        || haystack.contains("too many requests")
    {
        return ModelErrorKind::RateLimited;
    }
    if haystack.contains("server_error")
        || haystack.contains("overloaded")
        || haystack.contains("timeout")
        || haystack.contains("timed out")
        || haystack.contains("temporarily unavailable")
    {
        return ModelErrorKind::Transient;
    }

    ModelErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_model_not_found() {
        assert_eq!(
            classify_api_error("model_not_found", "invalid_request_error", "The model `gpt-9` does not exist"),
            ModelErrorKind::ModelNotFound
        );
    }

    #[test]
    fn test_classify_rate_limits() {
        assert_eq!(
            classify_api_error("rate_limit_exceeded", "requests", "Rate limit reached"),
            ModelErrorKind::RateLimited
        );
        assert_eq!(
            classify_api_error("", "insufficient_quota", "You exceeded your current quota"),
            ModelErrorKind::RateLimited
        );
    }

    #[test]
    fn test_classify_transient_and_other() {
        assert_eq!(
            classify_api_error("", "server_error", "The server is overloaded"),
            ModelErrorKind::Transient
        );
        assert_eq!(
            classify_api_error("invalid_api_key", "invalid_request_error", "Incorrect API key provided"),
            ModelErrorKind::Other
        );
    }

    /// 需要真实的 API 密钥：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_openai_round_trip -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_openai_round_trip() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = crate::config::Config::from_env();
        let client = OpenAiModelClient::new(
            &config.llm_api_key,
            &config.llm_api_base_url,
            config.model_timeout(),
        );
        let request = ModelRequest {
            model_id: config.primary_model.clone(),
            system_prompt: "Reply with the answer value only.".to_string(),
            user_prompt: "What is 2 + 3?".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };

        let response = client.complete(&request).await.expect("模型调用失败");
        println!("模型响应: {}", response.content);
        assert!(!response.content.is_empty());
    }
}
