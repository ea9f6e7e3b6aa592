//! 关联内容服务 - 业务能力层
//!
//! 题目要求抓取另一个网页、调用 API 或下载文件时，在调用模型之前把那份内容取回来，
//! 附在提示词里。取不到只记录日志，答题流程照常进行。

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::EnrichmentError;
use crate::infrastructure::PageRenderer;
use crate::models::{QuestionContext, QuestionKind};
use crate::services::heuristics::{embedded_json_objects, find_urls};
use crate::utils::logging::truncate_text;

/// 附加到提示词的关联内容最大字符数
pub const LINKED_CONTENT_CHARS: usize = 5000;

/// 题目引用的外部内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedContent {
    pub kind: QuestionKind,
    pub url: String,
    pub content: String,
}

/// 需要获取的关联地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentTarget {
    pub kind: QuestionKind,
    pub url: String,
}

/// 关联内容服务
///
/// - 网页抓取题：用渲染器打开题目中的地址，取可见文本
/// - API 题：带上页面里声明的请求头发送 GET，取响应正文
/// - 文件题：下载文件，只接受文本内容
pub struct ContextEnricher {
    renderer: Arc<dyn PageRenderer>,
    client: reqwest::Client,
    render_timeout: Duration,
}

impl ContextEnricher {
    pub fn new(renderer: Arc<dyn PageRenderer>, render_timeout: Duration) -> Self {
        Self::with_client(renderer, render_timeout, reqwest::Client::new())
    }

    pub fn with_client(
        renderer: Arc<dyn PageRenderer>,
        render_timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            renderer,
            client,
            render_timeout,
        }
    }

    /// 获取题目引用的内容，题目没有引用或获取失败时返回 None
    pub async fn enrich(&self, ctx: &QuestionContext) -> Option<LinkedContent> {
        let target = plan_enrichment(ctx)?;
        info!("🔗 {} 题目，获取关联内容: {}", target.kind, target.url);

        let fetched = match target.kind {
            QuestionKind::WebScraping => self.scrape(&target.url).await,
            QuestionKind::ApiCall => {
                self.call_api(&target.url, api_headers(&ctx.raw_page_content))
                    .await
            }
            QuestionKind::FileProcessing => self.download_text(&target.url).await,
            other => {
                debug!("{} 题目不需要关联内容", other);
                return None;
            }
        };

        match fetched {
            Ok(content) => {
                debug!("关联内容: {}", truncate_text(&content, 100));
                Some(LinkedContent {
                    kind: target.kind,
                    url: target.url,
                    content: content.chars().take(LINKED_CONTENT_CHARS).collect(),
                })
            }
            Err(e) => {
                warn!("⚠️ 关联内容获取失败: {}", e);
                None
            }
        }
    }

    async fn scrape(&self, url: &str) -> Result<String, EnrichmentError> {
        let page = self.renderer.render_page(url, self.render_timeout).await?;
        if page.body_text.trim().is_empty() {
            Ok(page.rendered_html)
        } else {
            Ok(page.body_text)
        }
    }

    async fn call_api(&self, url: &str, headers: HeaderMap) -> Result<String, EnrichmentError> {
        let http_failed = |source: reqwest::Error| EnrichmentError::Http {
            url: url.to_string(),
            source,
        };

        let body = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(http_failed)?
            .text()
            .await
            .map_err(http_failed)?;

        // JSON 响应整理成易读的格式
        Ok(match serde_json::from_str::<JsonValue>(&body) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(body),
            Err(_) => body,
        })
    }

    async fn download_text(&self, url: &str) -> Result<String, EnrichmentError> {
        let http_failed = |source: reqwest::Error| EnrichmentError::Http {
            url: url.to_string(),
            source,
        };

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(http_failed)?
            .bytes()
            .await
            .map_err(http_failed)?;

        String::from_utf8(bytes.to_vec()).map_err(|_| EnrichmentError::NotText {
            url: url.to_string(),
        })
    }
}

/// 判断题目是否引用外部内容，以及要获取的地址
///
/// 题目类型按关键词判断；地址取题干中第一个绝对地址，其次是页面内容中的，
/// 题目页面本身和提交地址不算。
pub fn plan_enrichment(ctx: &QuestionContext) -> Option<EnrichmentTarget> {
    let kind = QuestionKind::classify(&ctx.question_text);
    if !matches!(
        kind,
        QuestionKind::WebScraping | QuestionKind::ApiCall | QuestionKind::FileProcessing
    ) {
        return None;
    }

    let url = find_urls(&ctx.question_text)
        .into_iter()
        .chain(find_urls(&ctx.raw_page_content))
        .find(|url| !same_url(url, &ctx.source_url) && !same_url(url, &ctx.submission_url))?;

    Some(EnrichmentTarget { kind, url })
}

/// 页面中嵌入的 `"headers": {...}` 对象，只保留合法的字符串头
pub fn api_headers(raw_page_content: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for object in embedded_json_objects(raw_page_content) {
        let Some(JsonValue::Object(declared)) = object.get("headers") else {
            continue;
        };
        for (name, value) in declared {
            let name = HeaderName::from_bytes(name.as_bytes());
            let value = value.as_str().map(HeaderValue::from_str);
            if let (Ok(name), Some(Ok(value))) = (name, value) {
                headers.insert(name, value);
            }
        }
    }
    headers
}

fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::infrastructure::RenderedPage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn context(question: &str, raw: &str) -> QuestionContext {
        QuestionContext {
            question_text: question.to_string(),
            raw_page_content: raw.to_string(),
            source_url: "https://quiz.example/q/1".to_string(),
            submission_url: "https://quiz.example/submit".to_string(),
        }
    }

    struct MapRenderer(HashMap<String, RenderedPage>);

    #[async_trait]
    impl PageRenderer for MapRenderer {
        async fn render_page(&self, url: &str, _timeout: Duration) -> Result<RenderedPage, ExtractionError> {
            self.0.get(url).cloned().ok_or_else(|| ExtractionError::RenderFailed {
                url: url.to_string(),
                message: "not found".to_string(),
            })
        }
    }

    fn enricher(pages: &[(&str, &str)]) -> ContextEnricher {
        let pages = pages
            .iter()
            .map(|(url, body)| {
                (
                    url.to_string(),
                    RenderedPage {
                        rendered_html: format!("<html><body>{body}</body></html>"),
                        body_text: body.to_string(),
                    },
                )
            })
            .collect();
        ContextEnricher::new(Arc::new(MapRenderer(pages)), Duration::from_millis(10))
    }

    #[test]
    fn test_plan_skips_quiz_and_submission_urls() {
        let ctx = context(
            "Scrape https://quiz.example/q/1 and the website https://data.example/secret, then POST to https://quiz.example/submit",
            "",
        );
        assert_eq!(
            plan_enrichment(&ctx),
            Some(EnrichmentTarget {
                kind: QuestionKind::WebScraping,
                url: "https://data.example/secret".to_string(),
            })
        );
    }

    #[test]
    fn test_plan_uses_page_content_and_kind() {
        let ctx = context("Call the API and report the count", "GET https://api.example/v1/items");
        assert_eq!(
            plan_enrichment(&ctx).map(|t| (t.kind, t.url)),
            Some((QuestionKind::ApiCall, "https://api.example/v1/items".to_string()))
        );

        // 普通计算题不需要关联内容
        let ctx = context("What is the sum of 3 and 4? See https://other.example", "");
        assert_eq!(plan_enrichment(&ctx), None);

        // 没有可用地址
        let ctx = context("Scrape the website given below", "POST to https://quiz.example/submit");
        assert_eq!(plan_enrichment(&ctx), None);
    }

    #[test]
    fn test_api_headers_from_page() {
        let raw = r#"Use {"headers": {"X-Api-Key": "k123", "Accept": "application/json", "Bad Name": "x", "n": 1}}"#;
        let headers = api_headers(raw);
        assert_eq!(headers.get("x-api-key").and_then(|v| v.to_str().ok()), Some("k123"));
        assert_eq!(headers.get("accept").and_then(|v| v.to_str().ok()), Some("application/json"));
        assert_eq!(headers.len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_renders_linked_page() {
        let enricher = enricher(&[("https://data.example/secret", "The secret code is 8812")]);
        let ctx = context("Scrape https://data.example/secret and return the secret code", "");

        let linked = enricher.enrich(&ctx).await.unwrap();

        assert_eq!(linked.kind, QuestionKind::WebScraping);
        assert_eq!(linked.url, "https://data.example/secret");
        assert_eq!(linked.content, "The secret code is 8812");
    }

    #[tokio::test]
    async fn test_linked_content_is_truncated() {
        let long = "z".repeat(LINKED_CONTENT_CHARS + 100);
        let enricher = enricher(&[("https://data.example/long", long.as_str())]);
        let ctx = context("Scrape https://data.example/long", "");

        let linked = enricher.enrich(&ctx).await.unwrap();
        assert_eq!(linked.content.chars().count(), LINKED_CONTENT_CHARS);
    }

    #[tokio::test]
    async fn test_fetch_failures_are_absorbed() {
        let enricher = enricher(&[]);

        let ctx = context("Scrape https://data.example/missing", "");
        assert_eq!(enricher.enrich(&ctx).await, None);

        let ctx = context("Call the API at http://127.0.0.1:9/items", "");
        assert_eq!(enricher.enrich(&ctx).await, None);
    }
}
