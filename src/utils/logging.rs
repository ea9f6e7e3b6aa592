/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::SequenceRun;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则为 info（`verbose` 时为 debug）
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 答题序列模式");
    info!("🎯 起始 URL: {}", config.initial_url);
    info!(
        "🧠 主模型: {} | 备用模型: {} | 外部提供方: {}",
        config.primary_model,
        config.fallback_model,
        config.resolver_config().external_providers.len()
    );
    info!(
        "📊 预算: 最多 {} 题 / {} 秒",
        config.max_attempts, config.timeout_secs
    );
    info!("{}", "=".repeat(60));
}

/// 打印一次序列运行的统计信息
///
/// # 参数
/// - `run`: 序列运行记录
/// - `log_file_path`: 报告文件路径
pub fn log_run_finished(run: &SequenceRun, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 答题序列统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🆔 提交 ID: {}", run.submission_id);
    info!("📌 状态: {}", run.status);
    info!("🔁 尝试次数: {}", run.attempts);
    info!("🔗 最后地址: {}", run.last_url);
    if let Some(detail) = &run.detail {
        info!("📝 详情: {}", detail);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
