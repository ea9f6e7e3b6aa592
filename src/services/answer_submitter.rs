//! 答案提交服务 - 业务能力层
//!
//! 只负责"提交一个答案并解读结果"，任何失败都转换成 `correct=false` 的 verdict

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::SubmissionError;
use crate::models::{AnswerValue, Identity, SubmissionVerdict};

/// verdict 中保留的原始响应最大字符数
pub const RAW_BODY_LIMIT: usize = 1000;

/// 提交请求体
#[derive(Debug, Serialize)]
struct SubmissionPayload<'a> {
    email: &'a str,
    secret: &'a str,
    url: &'a str,
    answer: &'a AnswerValue,
}

/// 答案提交服务
pub struct AnswerSubmitter {
    client: reqwest::Client,
}

impl AnswerSubmitter {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 提交答案
    ///
    /// # 参数
    /// - `url`: 提交地址
    /// - `answer`: 答案，`None` 提交为空字符串
    /// - `context_url`: 当前题目页面地址
    /// - `identity`: 提交身份
    pub async fn submit(
        &self,
        url: &str,
        answer: &AnswerValue,
        context_url: &str,
        identity: &Identity,
    ) -> SubmissionVerdict {
        info!("📤 提交答案到 {}: {}", url, answer);

        let payload = SubmissionPayload {
            email: &identity.email,
            secret: &identity.secret,
            url: context_url,
            answer,
        };

        let verdict = match self.post(url, &payload).await {
            Ok((content_type, body)) => interpret_response(&content_type, &body),
            Err(e) => {
                warn!("❌ 提交失败: {}", e);
                SubmissionVerdict::failure(format!("Submission error: {}", e), None)
            }
        };

        info!(
            "📥 提交结果: correct={} next_url={:?} reason={:?}",
            verdict.correct, verdict.next_url, verdict.reason
        );
        verdict
    }

    async fn post(
        &self,
        url: &str,
        payload: &SubmissionPayload<'_>,
    ) -> Result<(String, String), SubmissionError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|source| SubmissionError::Transport {
                url: url.to_string(),
                source,
            })?;

        debug!("提交响应状态: {}", response.status());

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|source| SubmissionError::ReadBody {
                url: url.to_string(),
                source,
            })?;

        Ok((content_type, body))
    }
}

impl Default for AnswerSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

/// 解读提交响应
///
/// 声明为 JSON 时直接解析；否则尝试按 JSON 解析正文；都失败时保留截断后的原文
pub fn interpret_response(content_type: &str, body: &str) -> SubmissionVerdict {
    let declared_json = content_type.to_lowercase().contains("application/json");

    match serde_json::from_str::<JsonValue>(body) {
        Ok(value @ JsonValue::Object(_)) => SubmissionVerdict::from_json(&value),
        Ok(_) => SubmissionVerdict::failure(
            "Unexpected response body: not a JSON object",
            Some(truncate_raw(body)),
        ),
        Err(e) if declared_json => SubmissionVerdict::failure(
            format!("Error decoding JSON: {}", e),
            Some(truncate_raw(body)),
        ),
        Err(_) => SubmissionVerdict::failure(
            format!("Unexpected response content-type: {}", content_type),
            Some(truncate_raw(body)),
        ),
    }
}

fn truncate_raw(body: &str) -> String {
    body.chars().take(RAW_BODY_LIMIT).collect()
}
