//! 启发式解析 - 业务能力层
//!
//! 不调用任何模型，只根据页面文本中的模式推断答案与提交地址：
//! - 预解析：嵌入的 JSON 示例答案、"post ... to <url>" 提交指令
//! - 兜底求解：示例答案 → 占位符 → 数字 → 默认字符串

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Deserializer, Value as JsonValue};
use url::Url;

use crate::models::AnswerValue;

/// 题目接受任意答案时提交的占位符
pub const PLACEHOLDER_ANSWER: &str = "anything you want";

/// 所有启发式都失败时的默认答案
pub const DEFAULT_ANSWER: &str = "fallback";

static SUBMIT_INSTRUCTION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bpost\b[^\n]{0,80}?\bto\s+(https?://[^\s"'<>]+|/[^\s"'<>]+)"#).ok()
});

static PLACEHOLDER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)anything\s+you\s+want").ok());

static URL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).ok());

static NUMBER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").ok());

/// 预解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreParse {
    /// 嵌入 JSON 中 `answer` 字段的值
    pub sample_answer: Option<AnswerValue>,
    /// "post ... to <url>" 指令中的地址（未解析为绝对地址）
    pub submission_url: Option<String>,
}

/// 扫描页面文本，找出示例答案和提交指令
pub fn pre_parse(text: &str) -> PreParse {
    let sample_answer = embedded_json_objects(text)
        .into_iter()
        .filter_map(|obj| obj.get("answer").map(AnswerValue::from_literal))
        .find(|answer| !answer.is_none());

    PreParse {
        sample_answer,
        submission_url: find_submission_instruction(text),
    }
}

/// 找出 "post this JSON to <url>" 形式的提交地址
pub fn find_submission_instruction(text: &str) -> Option<String> {
    SUBMIT_INSTRUCTION_RE
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', ')', ']', '}'])
                .to_string()
        })
        .filter(|url| !url.is_empty())
}

/// 文本中出现的绝对地址，按出现顺序去重
pub fn find_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in URL_RE.iter().flat_map(|re| re.find_iter(text)) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', ')', ']', '}'])
            .to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// 提取文本中所有能完整解析的 JSON 对象
pub fn embedded_json_objects(text: &str) -> Vec<serde_json::Map<String, JsonValue>> {
    let mut objects = Vec::new();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<JsonValue>();

        match stream.next() {
            Some(Ok(JsonValue::Object(map))) => {
                objects.push(map);
                search_from = start + stream.byte_offset();
            }
            _ => search_from = start + 1,
        }
    }

    objects
}

/// 将相对地址解析为绝对地址，无法解析时返回 None
pub fn resolve_url(base: &str, candidate: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(candidate) {
        return Some(absolute.to_string());
    }
    Url::parse(base)
        .and_then(|base| base.join(candidate))
        .map(|u| u.to_string())
        .ok()
}

/// 兜底求解，总能给出一个答案
pub fn heuristic_solve(question_text: &str, raw_page_content: &str, parsed: &PreParse) -> AnswerValue {
    if let Some(sample) = &parsed.sample_answer {
        return sample.clone();
    }

    let text = if question_text.trim().is_empty() {
        raw_page_content
    } else {
        question_text
    };

    if is_placeholder(text) || is_placeholder(raw_page_content) {
        return AnswerValue::Text(PLACEHOLDER_ANSWER.to_string());
    }

    let without_urls = match URL_RE.as_ref() {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    let numbers: Vec<f64> = NUMBER_RE
        .iter()
        .flat_map(|re| re.find_iter(&without_urls))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .collect();

    if let Some(first) = numbers.first() {
        let value = if asks_for_total(question_text) {
            numbers.iter().sum()
        } else {
            *first
        };
        // 超长字面量求和可能溢出
        if value.is_finite() {
            return number_answer(value);
        }
    }

    AnswerValue::Text(DEFAULT_ANSWER.to_string())
}

fn is_placeholder(text: &str) -> bool {
    PLACEHOLDER_RE.as_ref().is_some_and(|re| re.is_match(text))
}

fn asks_for_total(question: &str) -> bool {
    let lower = question.to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == "sum" || token == "total" || token == "add")
}

fn number_answer(value: f64) -> AnswerValue {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        AnswerValue::Integer(value as i64)
    } else {
        AnswerValue::Float(value)
    }
}
