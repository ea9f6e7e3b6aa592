//! 页面渲染 - 基础设施层
//!
//! 持有浏览器资源，只暴露"渲染一个 URL"的能力

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::ExtractionError;

/// 取 body 可见文本的脚本
const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// 渲染后的页面
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    /// 执行脚本后的完整 HTML
    pub rendered_html: String,
    /// body 的可见文本
    pub body_text: String,
}

/// 页面渲染能力
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_page(&self, url: &str, timeout: Duration) -> Result<RenderedPage, ExtractionError>;
}

/// 基于 chromiumoxide 的渲染器
///
/// 每次渲染打开一个新标签页，取完内容后关闭
pub struct ChromeRenderer {
    browser: Browser,
    settle: Duration,
}

impl ChromeRenderer {
    /// # 参数
    /// - `browser`: 已连接的浏览器
    /// - `settle`: 导航完成后额外等待的时间，让页面脚本写入题目
    pub fn new(browser: Browser, settle: Duration) -> Self {
        Self { browser, settle }
    }

    async fn open(&self, url: &str) -> Result<Page, ExtractionError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| render_failed(url, e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| render_failed(url, e))?;
        Ok(page)
    }

    async fn snapshot(&self, url: &str, page: &Page) -> Result<RenderedPage, ExtractionError> {
        sleep(self.settle).await;

        let rendered_html = page.content().await.map_err(|e| render_failed(url, e))?;
        let body_text: String = page
            .evaluate(BODY_TEXT_JS)
            .await
            .map_err(|e| render_failed(url, e))?
            .into_value()
            .map_err(|e| render_failed(url, e))?;

        debug!(
            "渲染完成: {} (HTML {} 字节, 文本 {} 字节)",
            url,
            rendered_html.len(),
            body_text.len()
        );

        Ok(RenderedPage {
            rendered_html,
            body_text,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render_page(&self, url: &str, budget: Duration) -> Result<RenderedPage, ExtractionError> {
        debug!("打开页面: {}", url);

        let page = timeout(budget, self.open(url))
            .await
            .map_err(|_| ExtractionError::RenderTimeout {
                url: url.to_string(),
                timeout_ms: budget.as_millis(),
            })??;

        let snapshot = self.snapshot(url, &page).await;

        if let Err(e) = page.close().await {
            debug!("关闭页面失败: {}", e);
        }

        snapshot
    }
}

fn render_failed(url: &str, err: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::RenderFailed {
        url: url.to_string(),
        message: err.to_string(),
    }
}
