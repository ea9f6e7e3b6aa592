use serde_json::Value as JsonValue;

/// 提交结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionVerdict {
    pub correct: bool,
    /// 服务端建议的下一题地址
    pub next_url: Option<String>,
    pub reason: Option<String>,
    /// 无法解析时保留的原始响应（已截断）
    pub raw_error: Option<String>,
}

impl SubmissionVerdict {
    /// 从结构化响应体构造，字段类型不符时按缺失处理
    pub fn from_json(body: &JsonValue) -> Self {
        let correct = body
            .get("correct")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false);
        let next_url = body
            .get("url")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let reason = match body.get("reason") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Self {
            correct,
            next_url,
            reason,
            raw_error: None,
        }
    }

    /// 构造失败的 verdict
    pub fn failure(reason: impl Into<String>, raw_error: Option<String>) -> Self {
        Self {
            correct: false,
            next_url: None,
            reason: Some(reason.into()),
            raw_error,
        }
    }
}
