//! 答案值与类型推断
//!
//! 模型或启发式给出的原始文本统一经过 [`type_answer`] 转成 [`AnswerValue`]，
//! 优先级固定为：结构化对象 → 数字 → 布尔 → 字符串。

use std::fmt;

use phf::phf_map;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

/// 布尔词表（小写）
static BOOLEAN_WORDS: phf::Map<&'static str, bool> = phf_map! {
    "true" => true,
    "yes" => true,
    "false" => false,
    "no" => false,
};

/// 已确定类型的答案
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    /// JSON 对象或数组
    Structured(JsonValue),
    /// 所有层级都没有给出答案
    None,
}

impl AnswerValue {
    pub fn is_none(&self) -> bool {
        matches!(self, AnswerValue::None)
    }

    /// 再次执行类型推断
    ///
    /// 只有字符串会被重新解析，其余类型原样返回；对 [`type_answer`] 的输出
    /// 再调用一次结果不变。
    pub fn typed(self) -> Self {
        match self {
            AnswerValue::Text(text) => type_answer(&text),
            other => other,
        }
    }

    /// 按 JSON 字面量的原始类型转换（不解析字符串内容）
    ///
    /// 用于页面中嵌入的示例答案：`"answer": "42"` 仍然是字符串。
    pub fn from_literal(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => AnswerValue::None,
            JsonValue::Bool(b) => AnswerValue::Boolean(*b),
            JsonValue::Number(n) => from_number(n),
            JsonValue::String(s) => AnswerValue::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => AnswerValue::Structured(value.clone()),
        }
    }

    /// 转换为提交用的 JSON 值，`None` 提交为空字符串
    pub fn to_json(&self) -> JsonValue {
        match self {
            AnswerValue::Integer(i) => JsonValue::from(*i),
            AnswerValue::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            AnswerValue::Text(s) => JsonValue::String(s.clone()),
            AnswerValue::Boolean(b) => JsonValue::Bool(*b),
            AnswerValue::Structured(v) => v.clone(),
            AnswerValue::None => JsonValue::String(String::new()),
        }
    }
}

impl Serialize for AnswerValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::None => f.write_str("<none>"),
            AnswerValue::Text(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// 将原始文本转换为答案值
pub fn type_answer(raw: &str) -> AnswerValue {
    let text = strip_code_fence(raw.trim());

    // 1. 结构化对象（以及 JSON 字面量）
    if let Ok(value) = serde_json::from_str::<JsonValue>(text) {
        match value {
            JsonValue::Object(_) | JsonValue::Array(_) => return AnswerValue::Structured(value),
            JsonValue::Number(n) => return from_number(&n),
            JsonValue::Bool(b) => return AnswerValue::Boolean(b),
            // 去掉引号后按内容重新推断
            JsonValue::String(inner) => return type_answer(&inner),
            JsonValue::Null => {}
        }
    }

    // 2. 数字：有小数点按浮点，否则按整数
    if text.contains('.') {
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return AnswerValue::Float(f);
            }
        }
    } else if let Ok(i) = text.parse::<i64>() {
        return AnswerValue::Integer(i);
    }

    // 3. 布尔
    if let Some(b) = BOOLEAN_WORDS.get(text.to_lowercase().as_str()) {
        return AnswerValue::Boolean(*b);
    }

    // 4. 字符串
    AnswerValue::Text(text.to_string())
}

fn from_number(n: &Number) -> AnswerValue {
    match n.as_i64() {
        Some(i) => AnswerValue::Integer(i),
        None => AnswerValue::Float(n.as_f64().unwrap_or_default()),
    }
}

/// 同一行内可以直接跟内容的语言标记
const INLINE_FENCE_TAGS: [&str; 8] = ["json", "js", "javascript", "python", "py", "text", "txt", "plaintext"];

/// 去掉模型常见的 ``` 代码块包裹，嵌套的包裹一并去掉
fn strip_code_fence(text: &str) -> &str {
    let mut current = text;
    while let Some(inner) = strip_one_fence(current) {
        current = inner;
    }
    current
}

fn strip_one_fence(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("```")?.strip_suffix("```")?;

    // 第一行可能是语言标记，如 ```json
    let stripped = match inner.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest.trim(),
        Some(_) => inner.trim(),
        None => match inner.split_once(' ') {
            Some((tag, rest)) if INLINE_FENCE_TAGS.contains(&tag.to_lowercase().as_str()) => rest.trim(),
            _ => inner.trim(),
        },
    };
    Some(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_precedence() {
        assert_eq!(
            type_answer(r#"{"a": 1}"#),
            AnswerValue::Structured(json!({"a": 1}))
        );
        assert_eq!(type_answer("42"), AnswerValue::Integer(42));
        assert_eq!(type_answer("3.5"), AnswerValue::Float(3.5));
        assert_eq!(type_answer("3."), AnswerValue::Float(3.0));
        assert_eq!(type_answer("Yes"), AnswerValue::Boolean(true));
        assert_eq!(type_answer("false"), AnswerValue::Boolean(false));
        assert_eq!(type_answer("Paris"), AnswerValue::Text("Paris".to_string()));
    }

    #[test]
    fn test_quoted_string_is_unwrapped() {
        assert_eq!(type_answer(r#""hello""#), AnswerValue::Text("hello".to_string()));
        assert_eq!(type_answer(r#""12""#), AnswerValue::Integer(12));
    }

    #[test]
    fn test_code_fence_is_stripped() {
        assert_eq!(
            type_answer("```json\n{\"total\": 7}\n```"),
            AnswerValue::Structured(json!({"total": 7}))
        );
        assert_eq!(type_answer("```\n128\n```"), AnswerValue::Integer(128));
        assert_eq!(
            type_answer("```json {\"a\":1}```"),
            AnswerValue::Structured(json!({"a": 1}))
        );
        assert_eq!(type_answer("``````\n5\n``````"), AnswerValue::Integer(5));
        assert_eq!(
            type_answer("```hello world```"),
            AnswerValue::Text("hello world".to_string())
        );
    }

    #[test]
    fn test_non_finite_is_text() {
        assert_eq!(type_answer("inf"), AnswerValue::Text("inf".to_string()));
        assert_eq!(type_answer("null"), AnswerValue::Text("null".to_string()));
    }

    #[test]
    fn test_typing_is_idempotent() {
        for raw in [
            "42",
            "-7",
            "2.25",
            "yes",
            "No",
            "  spaced out  ",
            r#"{"k": [1, 2]}"#,
            r#""\"nested\"""#,
            "null",
            "```unterminated",
            "``````\n5\n``````",
            "```json {\"a\":1}```",
            "```\n```\n```text\nyes\n```\n```\n```",
            "```` ```",
            "",
        ] {
            let once = type_answer(raw);
            let twice = once.clone().typed();
            assert_eq!(once, twice, "input: {raw:?}");
        }
    }

    #[test]
    fn test_typed_value_passes_through() {
        assert_eq!(AnswerValue::Integer(5).typed(), AnswerValue::Integer(5));
        assert_eq!(AnswerValue::None.typed(), AnswerValue::None);
    }

    #[test]
    fn test_from_literal_keeps_json_type() {
        assert_eq!(
            AnswerValue::from_literal(&json!("42")),
            AnswerValue::Text("42".to_string())
        );
        assert_eq!(AnswerValue::from_literal(&json!(42)), AnswerValue::Integer(42));
        assert_eq!(AnswerValue::from_literal(&json!(true)), AnswerValue::Boolean(true));
        assert_eq!(AnswerValue::from_literal(&json!(null)), AnswerValue::None);
    }

    #[test]
    fn test_none_serializes_as_empty_string() {
        assert_eq!(serde_json::to_value(AnswerValue::None).unwrap(), json!(""));
        assert_eq!(serde_json::to_value(AnswerValue::Float(1.5)).unwrap(), json!(1.5));
    }
}
