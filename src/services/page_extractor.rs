//! 题目提取服务 - 业务能力层
//!
//! 只负责"把一个 URL 变成 QuestionContext"，不关心答题流程

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SequenceFatalError;
use crate::infrastructure::{PageRenderer, RenderedPage};
use crate::models::QuestionContext;
use crate::services::heuristics::{find_submission_instruction, resolve_url};
use crate::utils::logging::truncate_text;

/// 题干候选选择器，越靠前越具体
const QUESTION_SELECTORS: [&str; 8] = [
    "#result",
    ".question",
    ".quiz-question",
    "h1",
    "h2",
    ".content",
    ".main",
    "body",
];

/// 题干至少要超过的字符数
const MIN_QUESTION_CHARS: usize = 10;

/// 长字符串字面量被视为 base64 的最小长度
const MIN_BASE64_LITERAL: usize = 40;

static QUESTION_SELECTOR_LIST: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    QUESTION_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

static SCRIPT_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("script").ok());

static FORM_ACTION_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("form[action]").ok());

static ATOB_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"atob\(\s*["'`]([A-Za-z0-9+/=\s]+)["'`]\s*\)"#).ok());

static BASE64_LITERAL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"["'`]([A-Za-z0-9+/]+={0,2})["'`]"#).ok());

/// 题目提取服务
///
/// 职责：
/// - 渲染题目页面
/// - 解码脚本中的 base64 载荷
/// - 找出题干和提交地址
/// - 渲染失败时返回退化上下文，不中断流程
pub struct PageExtractor {
    renderer: Arc<dyn PageRenderer>,
    render_timeout: Duration,
}

impl PageExtractor {
    pub fn new(renderer: Arc<dyn PageRenderer>, render_timeout: Duration) -> Self {
        Self {
            renderer,
            render_timeout,
        }
    }

    /// 提取题目上下文
    ///
    /// 只有 URL 无法解析时返回错误
    pub async fn extract(&self, url: &str) -> Result<QuestionContext, SequenceFatalError> {
        let base = Url::parse(url).map_err(|e| SequenceFatalError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let page = match self.renderer.render_page(url, self.render_timeout).await {
            Ok(page) => page,
            Err(e) => {
                warn!("⚠️ 页面渲染失败，使用退化上下文: {}", e);
                return Ok(QuestionContext::degraded(url));
            }
        };

        let ctx = build_context(url, &base, page);
        info!(
            "✓ 题目提取完成: {}",
            truncate_text(&ctx.question_text, 100)
        );
        debug!("提交地址: {}", ctx.submission_url);

        Ok(ctx)
    }
}

/// 从渲染结果构造题目上下文
pub fn build_context(url: &str, base: &Url, page: RenderedPage) -> QuestionContext {
    let RenderedPage {
        mut rendered_html,
        body_text,
    } = page;

    let payloads = decode_script_payloads(&Html::parse_document(&rendered_html));
    let mut raw_page_content = body_text.clone();
    for payload in &payloads {
        debug!("解码脚本载荷: {}", truncate_text(payload, 80));
        rendered_html.push('\n');
        rendered_html.push_str(payload);
        raw_page_content.push('\n');
        raw_page_content.push_str(payload);
    }

    let document = Html::parse_document(&rendered_html);

    let question_text = find_question_text(&document).unwrap_or_else(|| body_text.trim().to_string());

    let submission_url = find_submission_instruction(&raw_page_content)
        .or_else(|| find_submission_instruction(&rendered_html))
        .or_else(|| form_action(&document))
        .and_then(|candidate| resolve_url(base.as_str(), &candidate))
        .unwrap_or_else(|| url.to_string());

    QuestionContext {
        question_text,
        raw_page_content,
        source_url: url.to_string(),
        submission_url,
    }
}

fn find_question_text(document: &Html) -> Option<String> {
    QUESTION_SELECTOR_LIST.iter().find_map(|selector| {
        document
            .select(selector)
            .map(visible_text)
            .find(|text| text.chars().count() > MIN_QUESTION_CHARS)
    })
}

/// 元素的可见文本，跳过 script / style 内容
fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| name == "script" || name == "style");
        if !hidden && !text.trim().is_empty() {
            parts.push(text.trim());
        }
    }
    parts.join(" ")
}

fn form_action(document: &Html) -> Option<String> {
    let selector = FORM_ACTION_SELECTOR.as_ref()?;
    document
        .select(selector)
        .filter_map(|form| form.value().attr("action"))
        .map(str::trim)
        .find(|action| !action.is_empty())
        .map(str::to_string)
}

/// 解码内联脚本中的 base64 载荷（只保留能解码为 UTF-8 的内容）
fn decode_script_payloads(document: &Html) -> Vec<String> {
    let Some(selector) = SCRIPT_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let mut payloads: Vec<String> = Vec::new();
    for script in document.select(selector) {
        let source: String = script.text().collect();

        let atob_args = ATOB_RE
            .iter()
            .flat_map(|re| re.captures_iter(&source))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let literals = BASE64_LITERAL_RE
            .iter()
            .flat_map(|re| re.captures_iter(&source))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|s| s.len() >= MIN_BASE64_LITERAL)
            .map(str::to_string);

        for candidate in atob_args.chain(literals) {
            if let Some(decoded) = decode_base64_text(&candidate) {
                if !payloads.contains(&decoded) {
                    payloads.push(decoded);
                }
            }
        }
    }

    payloads
}

fn decode_base64_text(candidate: &str) -> Option<String> {
    let compact: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let printable = text
        .chars()
        .all(|c| !c.is_control() || c.is_whitespace());
    (printable && !text.trim().is_empty()).then_some(text)
}
