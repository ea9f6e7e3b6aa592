//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验配置、写报告文件头、启动浏览器
//! 2. **组件装配**：渲染器 → 提取器 / 关联内容 / 解析器 / 提交器 → 序列 → 调度器
//! 3. **运行**：为配置的起始 URL 启动一条序列并等待结束
//!
//! ## 设计特点
//!
//! - **资源所有者**：浏览器只由渲染器持有
//! - **向下委托**：单题流程由 QuizSequencer 负责

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::ChromeRenderer;
use crate::models::Identity;
use crate::orchestrator::dispatcher::Dispatcher;
use crate::services::{AnswerResolver, AnswerSubmitter, ContextEnricher, PageExtractor, RunReporter};
use crate::utils::logging::{log_run_finished, log_startup};
use crate::workflow::{QuizSequencer, SequenceBudget};

/// 应用主结构
pub struct App {
    config: Config,
    dispatcher: Dispatcher,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        let reporter = Arc::new(RunReporter::new(config.output_log_file.clone()));
        reporter.init()?;

        log_startup(&config);

        let browser = browser::open_browser(&config)
            .await
            .context("浏览器启动失败")?;
        let renderer = Arc::new(ChromeRenderer::new(browser, config.render_settle()));

        let mut resolver = AnswerResolver::from_config(&config);
        if config.enable_context_enrichment {
            resolver = resolver.with_enricher(Arc::new(ContextEnricher::new(
                renderer.clone(),
                config.render_timeout(),
            )));
        }

        let sequencer = QuizSequencer::new(
            Arc::new(PageExtractor::new(renderer, config.render_timeout())),
            Arc::new(resolver),
            Arc::new(AnswerSubmitter::new()),
            SequenceBudget::from_config(&config),
        );

        let dispatcher = Dispatcher::new(Arc::new(sequencer), Some(reporter));

        Ok(Self { config, dispatcher })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        if self.config.initial_url.is_empty() {
            warn!("⚠️ 未配置起始 URL (QUIZ_URL)，程序结束");
            return Ok(());
        }

        let identity = Identity::new(self.config.email.clone(), self.config.secret.clone());
        let (submission_id, handle) = self.dispatcher.accept(&self.config.initial_url, identity);
        info!("⏳ 等待序列 {} 结束...", submission_id);

        let run = handle.await.context("答题任务异常退出")?;

        log_run_finished(&run, &self.config.output_log_file);

        Ok(())
    }
}
